//! What the signed-in role can see and open.

use minefornow_session::role_gate::{self, Route, RouteAccess};

use super::{CliError, Session, signed_in_user};

pub async fn tabs(session: &Session) -> Result<(), CliError> {
    let user = signed_in_user(session).await?;
    let user = Some(&user);

    let tabs = role_gate::dashboard_tabs(user)
        .into_iter()
        .map(|tab| tab.slug())
        .collect::<Vec<_>>();
    tracing::info!("Dashboard tabs: {}", tabs.join(", "));

    if let Some(tab) = role_gate::default_tab(user) {
        tracing::info!("Opens on: {}", tab.slug());
    }
    if let Some(view) = role_gate::reservations_view(user) {
        tracing::info!("Reservations view: {view:?}");
    }
    tracing::info!(
        "Owner offer: {:?}",
        role_gate::owner_call_to_action(user)
    );

    for route in Route::ALL {
        let access = match role_gate::route_access(route, user) {
            RouteAccess::Allowed => "allowed",
            RouteAccess::RequiresLogin => "requires login",
            RouteAccess::Forbidden => "forbidden",
        };
        tracing::info!("  {:<16} {access}", route.path());
    }
    Ok(())
}
