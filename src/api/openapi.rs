use super::handlers::{auth, health};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut openapi = cargo_openapi();

    let mut auth_tag = Tag::new("auth");
    auth_tag.description =
        Some("Registration, login, token refresh and one-time token flows".to_string());

    let mut oauth_tag = Tag::new("oauth");
    oauth_tag.description = Some("Google federation (PKCE)".to_string());

    let mut sessions_tag = Tag::new("sessions");
    sessions_tag.description = Some("Device-bound session management".to_string());

    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Account self-service".to_string());

    let mut admin_tag = Tag::new("admin");
    admin_tag.description = Some("Administrative user and session queries".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service and database health".to_string());

    openapi.tags = Some(vec![
        auth_tag,
        oauth_tag,
        sessions_tag,
        users_tag,
        admin_tag,
        health_tag,
    ]);

    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(health::health))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::login::logout))
        .routes(routes!(auth::login::refresh))
        .routes(routes!(auth::verification::verify_email))
        .routes(routes!(auth::verification::resend_verification))
        .routes(routes!(auth::reset::forgot_password))
        .routes(routes!(auth::reset::reset_password))
        .routes(routes!(auth::profile::me))
        .routes(routes!(auth::profile::update_password))
        .routes(routes!(auth::oauth::google_login))
        .routes(routes!(auth::oauth::google_callback))
        .routes(routes!(auth::sessions::list))
        .routes(routes!(auth::sessions::delete))
        .routes(routes!(auth::admin::users))
        .routes(routes!(auth::admin::user_sessions))
        .routes(routes!(auth::admin::delete_user_session))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        for name in ["auth", "oauth", "sessions", "users", "admin", "health"] {
            assert!(tags.iter().any(|tag| tag.name == name), "missing tag: {name}");
        }

        for path in [
            "/auth/register",
            "/auth/login",
            "/auth/logout",
            "/auth/refresh",
            "/auth/email/verify",
            "/auth/email/resend",
            "/auth/password/forgot",
            "/auth/password/reset",
            "/auth/me",
            "/auth/google/login",
            "/auth/google/callback",
            "/sessions",
            "/sessions/{id}",
            "/users/me/password",
            "/admin/users",
            "/admin/users/{user_id}/sessions",
            "/admin/users/sessions/{session_id}",
            "/health",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing path: {path}");
        }
    }
}
