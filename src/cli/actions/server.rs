use crate::{
    api,
    api::handlers::auth::{AuthConfig, GoogleConfig},
    cli::actions::Action,
};
use anyhow::Result;

/// Handle the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server(args) = action;

    let mut auth_config = AuthConfig::new(
        args.app_origin,
        args.access_token_secret,
        args.refresh_token_secret,
    )
    .with_access_token_ttl_seconds(args.access_token_expiry_seconds)
    .with_refresh_token_ttl_seconds(args.refresh_token_expiry_seconds)
    .with_one_time_token_ttl_minutes(args.one_time_token_expiry_minutes);

    if let Some(google) = args.google {
        auth_config = auth_config.with_google(GoogleConfig::new(
            google.client_id,
            google.client_secret,
            google.redirect_uri,
        ));
    }

    api::new(args.port, args.dsn, auth_config).await
}
