use crate::api::handlers::{
    auth::{login, oauth, register, reset, session},
    health, students,
};
use utoipa::openapi::{
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Components, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Endpoints registered here are both served and documented.
/// `GET /` and `OPTIONS /health` are added in [`crate::api::app`] and stay undocumented.
pub(crate) fn api_router() -> OpenApiRouter {
    // Handlers sharing a path go in the same `routes!` so their methods merge.
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(register::register))
        .routes(routes!(login::login))
        .routes(routes!(session::refresh))
        .routes(routes!(session::logout))
        .routes(routes!(reset::request_reset_email))
        .routes(routes!(reset::reset_password))
        .routes(routes!(oauth::get_oauth_url))
        .routes(routes!(oauth::confirm_oauth))
        .routes(routes!(students::list_students, students::create_student))
        .routes(routes!(
            students::get_student,
            students::upsert_student,
            students::patch_student,
            students::delete_student
        ));

    let openapi = router.get_openapi_mut();
    openapi.tags = Some(vec![
        tag(env!("CARGO_PKG_NAME"), "Student records API"),
        tag("health", "Liveness and database reachability"),
        tag("auth", "Sessions, password reset and Google sign-in"),
        tag("students", "Student records guarded by role and ownership"),
    ]);
    openapi
        .components
        .get_or_insert_with(Components::default)
        .add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );

    router
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
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
    Some(value.trim()).filter(|v| !v.is_empty())
}

fn parse_author<'a>(author: &'a str) -> (Option<&'a str>, Option<&'a str>) {
    let non_empty = |s: &'a str| Some(s.trim()).filter(|v| !v.is_empty());
    author.find('<').map_or_else(
        || (non_empty(author), None),
        |start| {
            (
                non_empty(&author[..start]),
                non_empty(author[start + 1..].trim_end_matches('>')),
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Team Tutela <team@tutela.dev>"),
            (Some("Team Tutela"), Some("team@tutela.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<only@mail>"), (None, Some("only@mail")));
    }

    #[test]
    fn document_uses_cargo_metadata() {
        let doc = openapi();
        let contact = doc.info.contact.as_ref();
        assert_eq!(
            contact.and_then(|c| c.name.as_deref()),
            Some("Team Tutela")
        );
        assert_eq!(
            contact.and_then(|c| c.email.as_deref()),
            Some("team@tutela.dev")
        );
        assert_eq!(
            doc.info.license.as_ref().map(|l| l.name.as_str()),
            Some("BSD-3-Clause")
        );
    }

    #[test]
    fn document_lists_every_route() {
        let doc = openapi();
        for path in [
            "/health",
            "/auth/register",
            "/auth/login",
            "/auth/refresh",
            "/auth/logout",
            "/auth/request-reset-email",
            "/auth/reset-password",
            "/auth/get-oauth-url",
            "/auth/confirm-oauth",
            "/students",
            "/students/{studentId}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let tags: Vec<_> = doc
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert!(tags.contains(&"students".to_string()));
    }
}
