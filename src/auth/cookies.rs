use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::config::CookieConfig;

pub const SESSION_COOKIE: &str = "auth-token";

fn session_cookie(cfg: &CookieConfig, value: String, max_age: Duration) -> Cookie<'static> {
    // Readable from JS: the frontend checks for the token itself.
    let mut builder = Cookie::build((SESSION_COOKIE, value))
        .http_only(false)
        .secure(cfg.secure)
        .same_site(SameSite::Strict)
        .max_age(max_age)
        .path("/");
    if let Some(domain) = &cfg.domain {
        builder = builder.domain(domain.clone());
    }
    builder.build()
}

pub fn set_session(jar: CookieJar, cfg: &CookieConfig, token: String, ttl: std::time::Duration) -> CookieJar {
    let max_age = Duration::seconds(ttl.as_secs() as i64);
    jar.add(session_cookie(cfg, token, max_age))
}

pub fn clear_session(jar: CookieJar, cfg: &CookieConfig) -> CookieJar {
    jar.add(session_cookie(cfg, String::new(), Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev() -> CookieConfig {
        CookieConfig {
            secure: false,
            domain: None,
        }
    }

    #[test]
    fn session_cookie_attributes() {
        let jar = set_session(
            CookieJar::new(),
            &dev(),
            "tok".into(),
            std::time::Duration::from_secs(24 * 3600),
        );
        let c = jar.get(SESSION_COOKIE).expect("cookie set");
        assert_eq!(c.value(), "tok");
        assert_eq!(c.http_only(), Some(false));
        assert_eq!(c.same_site(), Some(SameSite::Strict));
        assert_eq!(c.max_age(), Some(Duration::hours(24)));
        assert_eq!(c.path(), Some("/"));
        assert_eq!(c.domain(), None);
    }

    #[test]
    fn production_cookie_is_secure_and_scoped() {
        let cfg = CookieConfig {
            secure: true,
            domain: Some("perfil.example".into()),
        };
        let jar = set_session(CookieJar::new(), &cfg, "tok".into(), std::time::Duration::from_secs(60));
        let c = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(c.secure(), Some(true));
        assert_eq!(c.domain(), Some("perfil.example"));
    }

    #[test]
    fn clearing_expires_immediately() {
        let jar = clear_session(CookieJar::new(), &dev());
        let c = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(c.value(), "");
        assert_eq!(c.max_age(), Some(Duration::ZERO));
    }
}
