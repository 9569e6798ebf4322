//! Role-based access decisions.
//!
//! Pure functions of the resident user. `ADMIN` has every `OWNER`
//! capability; `PENDING_OWNER` has `RENTER` capabilities but sees a
//! pending-review notice instead of the "become an owner" offer.

use minefornow_core::{SessionUser, UserRole};

/// Something a role may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Book and pay for rentals, see own bookings.
    RentCars,
    /// List, edit and remove own cars; see reservations on them.
    ManageCars,
    /// Review owner upgrade requests.
    ReviewOwnerRequests,
    /// See marketplace-wide statistics.
    ViewStatistics,
}

/// A dashboard tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardTab {
    Statistics,
    OwnerRequests,
    Reservations,
    Cars,
    Settings,
}

impl DashboardTab {
    /// Stable identifier used on the command line and in links.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Statistics => "statistics",
            Self::OwnerRequests => "owner-requests",
            Self::Reservations => "reservations",
            Self::Cars => "cars",
            Self::Settings => "settings",
        }
    }
}

/// Which reservations listing the reservations tab shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationsView {
    /// The user's own bookings as a renter.
    MyBookings,
    /// Bookings other people made on the user's cars.
    OwnerReservations,
}

/// Application routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Cars,
    CarDetails,
    Checkout,
    Payment,
    Dashboard,
    AddCar,
    EditCar,
    BecomeOwner,
    Login,
    Register,
}

impl Route {
    /// Every route, in navigation order.
    pub const ALL: [Self; 11] = [
        Self::Home,
        Self::Cars,
        Self::CarDetails,
        Self::Checkout,
        Self::Payment,
        Self::Dashboard,
        Self::AddCar,
        Self::EditCar,
        Self::BecomeOwner,
        Self::Login,
        Self::Register,
    ];

    /// URL path pattern.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Cars => "/cars",
            Self::CarDetails => "/cars/:id",
            Self::Checkout => "/checkout",
            Self::Payment => "/payment",
            Self::Dashboard => "/dashboard",
            Self::AddCar => "/add-car",
            Self::EditCar => "/edit-car/:id",
            Self::BecomeOwner => "/become-owner",
            Self::Login => "/login",
            Self::Register => "/register",
        }
    }

    const fn required_capability(self) -> Option<Capability> {
        match self {
            Self::AddCar | Self::EditCar => Some(Capability::ManageCars),
            _ => None,
        }
    }

    const fn requires_login(self) -> bool {
        !matches!(
            self,
            Self::Home | Self::Cars | Self::CarDetails | Self::Login | Self::Register
        )
    }
}

/// Outcome of a route check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Allowed,
    /// Anonymous user on a protected route; send them to the login page.
    RequiresLogin,
    /// Signed in, but the role lacks the capability.
    Forbidden,
}

/// What to show where the "become an owner" offer goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerCallToAction {
    /// Nobody is signed in.
    Hidden,
    /// Invite the renter to apply.
    Offer,
    /// Application submitted, waiting for an admin.
    PendingReview,
    /// Already an owner (or admin).
    AlreadyOwner,
}

/// Capabilities granted to `role`.
#[must_use]
pub fn capabilities(role: UserRole) -> &'static [Capability] {
    match role {
        UserRole::Renter | UserRole::PendingOwner => &[Capability::RentCars],
        UserRole::Owner => &[Capability::RentCars, Capability::ManageCars],
        UserRole::Admin => &[
            Capability::RentCars,
            Capability::ManageCars,
            Capability::ReviewOwnerRequests,
            Capability::ViewStatistics,
        ],
    }
}

/// Whether `user` holds `capability`. Anonymous users hold none.
#[must_use]
pub fn has_capability(user: Option<&SessionUser>, capability: Capability) -> bool {
    user.is_some_and(|u| capabilities(u.role).contains(&capability))
}

/// Tabs shown on the dashboard, in display order.
#[must_use]
pub fn dashboard_tabs(user: Option<&SessionUser>) -> Vec<DashboardTab> {
    let Some(user) = user else {
        return Vec::new();
    };

    let mut tabs = Vec::with_capacity(5);
    if has_capability(Some(user), Capability::ViewStatistics) {
        tabs.push(DashboardTab::Statistics);
    }
    if has_capability(Some(user), Capability::ReviewOwnerRequests) {
        tabs.push(DashboardTab::OwnerRequests);
    }
    tabs.push(DashboardTab::Reservations);
    if has_capability(Some(user), Capability::ManageCars) {
        tabs.push(DashboardTab::Cars);
    }
    tabs.push(DashboardTab::Settings);
    tabs
}

/// Tab selected when the dashboard opens.
#[must_use]
pub fn default_tab(user: Option<&SessionUser>) -> Option<DashboardTab> {
    let user = user?;
    Some(match user.role {
        UserRole::Admin => DashboardTab::Statistics,
        UserRole::Owner => DashboardTab::Cars,
        UserRole::Renter | UserRole::PendingOwner => DashboardTab::Reservations,
    })
}

/// Which listing the reservations tab renders.
#[must_use]
pub fn reservations_view(user: Option<&SessionUser>) -> Option<ReservationsView> {
    let user = user?;
    Some(if has_capability(Some(user), Capability::ManageCars) {
        ReservationsView::OwnerReservations
    } else {
        ReservationsView::MyBookings
    })
}

/// Decide whether `user` may open `route`.
#[must_use]
pub fn route_access(route: Route, user: Option<&SessionUser>) -> RouteAccess {
    if !route.requires_login() {
        return RouteAccess::Allowed;
    }
    if user.is_none() {
        return RouteAccess::RequiresLogin;
    }
    match route.required_capability() {
        Some(capability) if !has_capability(user, capability) => RouteAccess::Forbidden,
        _ => RouteAccess::Allowed,
    }
}

/// What the owner-offer slot shows for `user`.
#[must_use]
pub fn owner_call_to_action(user: Option<&SessionUser>) -> OwnerCallToAction {
    match user.map(|u| u.role) {
        None => OwnerCallToAction::Hidden,
        Some(UserRole::Renter) => OwnerCallToAction::Offer,
        Some(UserRole::PendingOwner) => OwnerCallToAction::PendingReview,
        Some(UserRole::Owner | UserRole::Admin) => OwnerCallToAction::AlreadyOwner,
    }
}
