use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde_json::json;

use crate::config::RateLimitConfig;
use crate::observability;

/// Requests-per-window quota, parsed from `"100/minute"`-style strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub max: u32,
    pub window: Duration,
}

impl Quota {
    pub fn parse(s: &str) -> Option<Self> {
        let (count, per) = s.split_once('/')?;
        let max = count.trim().parse().ok()?;
        let window = match per.trim() {
            "second" => Duration::from_secs(1),
            "minute" => Duration::from_secs(60),
            "hour" => Duration::from_secs(3600),
            _ => return None,
        };
        Some(Self { max, window })
    }
}

impl std::fmt::Display for Quota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let per = match self.window.as_secs() {
            1 => "second",
            60 => "minute",
            3600 => "hour",
            _ => return write!(f, "{}/{}s", self.max, self.window.as_secs()),
        };
        write!(f, "{}/{per}", self.max)
    }
}

/// Endpoint quota categories, mirroring the per-route limits of the API:
/// list endpoints count against `Search`, single reads against `Read`,
/// creates and updates against `Write`, deletes against `Delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Read,
    Write,
    Delete,
    Search,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Read => "read",
            Category::Write => "write",
            Category::Delete => "delete",
            Category::Search => "search",
        }
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counters per (category, client ip). Whitelisted addresses
/// bypass entirely, as do all requests when limiting is disabled.
pub struct RateLimits {
    enabled: bool,
    whitelist: Vec<IpAddr>,
    read: Quota,
    write: Quota,
    delete: Quota,
    search: Quota,
    windows: DashMap<(Category, IpAddr), Window>,
}

impl RateLimits {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            whitelist: config.whitelist.clone(),
            read: config.read,
            write: config.write,
            delete: config.delete,
            search: config.search,
            windows: DashMap::new(),
        }
    }

    pub fn quota(&self, category: Category) -> Quota {
        match category {
            Category::Read => self.read,
            Category::Write => self.write,
            Category::Delete => self.delete,
            Category::Search => self.search,
        }
    }

    /// Counts the request against its window. `Err` carries the seconds
    /// until the window rolls over.
    pub fn check(&self, category: Category, ip: IpAddr) -> Result<(), u64> {
        if !self.enabled || self.whitelist.contains(&ip) {
            return Ok(());
        }
        let quota = self.quota(category);
        let mut window = self.windows.entry((category, ip)).or_insert_with(|| Window {
            started: Instant::now(),
            count: 0,
        });
        let elapsed = window.started.elapsed();
        if elapsed >= quota.window {
            window.started = Instant::now();
            window.count = 0;
        }
        if window.count >= quota.max {
            let remaining = quota.window.saturating_sub(elapsed);
            return Err(remaining.as_secs().max(1));
        }
        window.count += 1;
        Ok(())
    }
}

/// Per-route-group middleware state: the shared limiter plus the category
/// the wrapped routes count against.
#[derive(Clone)]
pub struct CategoryLimit {
    pub limits: Arc<RateLimits>,
    pub category: Category,
}

pub async fn enforce(
    State(ctx): State<CategoryLimit>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);
    match ctx.limits.check(ctx.category, ip) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let endpoint = request.uri().path().to_string();
            metrics::counter!(observability::RATE_LIMITED_TOTAL).increment(1);
            tracing::warn!(
                client = %ip,
                endpoint = %endpoint,
                category = ctx.category.as_str(),
                "rate limit exceeded"
            );
            rejected(ctx.limits.quota(ctx.category), &endpoint, retry_after)
        }
    }
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn rejected(quota: Quota, endpoint: &str, retry_after: u64) -> Response {
    let body = json!({
        "error": "Rate Limit Exceeded",
        "message": "Too many requests. Please try again later.",
        "details": {
            "limit": quota.to_string(),
            "endpoint": endpoint,
            "retry_after": retry_after,
        },
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert("Retry-After", HeaderValue::from(retry_after));
    headers.insert("X-RateLimit-Limit", HeaderValue::from(quota.max));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(quota: Quota, whitelist: Vec<IpAddr>, enabled: bool) -> RateLimits {
        RateLimits {
            enabled,
            whitelist,
            read: quota,
            write: quota,
            delete: quota,
            search: quota,
            windows: DashMap::new(),
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn quota_parses_standard_strings() {
        assert_eq!(
            Quota::parse("100/minute"),
            Some(Quota {
                max: 100,
                window: Duration::from_secs(60)
            })
        );
        assert_eq!(
            Quota::parse("5/second").unwrap().window,
            Duration::from_secs(1)
        );
        assert_eq!(
            Quota::parse("1000/hour").unwrap().window,
            Duration::from_secs(3600)
        );
        assert!(Quota::parse("garbage").is_none());
        assert!(Quota::parse("10/fortnight").is_none());
        assert!(Quota::parse("/minute").is_none());
    }

    #[test]
    fn quota_displays_like_its_source() {
        assert_eq!(Quota::parse("20/minute").unwrap().to_string(), "20/minute");
    }

    #[test]
    fn requests_within_quota_pass() {
        let rl = limits(
            Quota {
                max: 3,
                window: Duration::from_secs(60),
            },
            vec![],
            true,
        );
        let client = ip("10.0.0.1");
        for _ in 0..3 {
            rl.check(Category::Read, client).unwrap();
        }
        assert!(rl.check(Category::Read, client).is_err());
    }

    #[test]
    fn categories_have_independent_windows() {
        let rl = limits(
            Quota {
                max: 1,
                window: Duration::from_secs(60),
            },
            vec![],
            true,
        );
        let client = ip("10.0.0.1");
        rl.check(Category::Read, client).unwrap();
        assert!(rl.check(Category::Read, client).is_err());
        // Other category unaffected
        rl.check(Category::Write, client).unwrap();
    }

    #[test]
    fn clients_have_independent_windows() {
        let rl = limits(
            Quota {
                max: 1,
                window: Duration::from_secs(60),
            },
            vec![],
            true,
        );
        rl.check(Category::Read, ip("10.0.0.1")).unwrap();
        rl.check(Category::Read, ip("10.0.0.2")).unwrap();
        assert!(rl.check(Category::Read, ip("10.0.0.1")).is_err());
    }

    #[test]
    fn whitelisted_ips_bypass() {
        let rl = limits(
            Quota {
                max: 1,
                window: Duration::from_secs(60),
            },
            vec![ip("127.0.0.1")],
            true,
        );
        for _ in 0..50 {
            rl.check(Category::Delete, ip("127.0.0.1")).unwrap();
        }
    }

    #[test]
    fn disabled_limiter_passes_everything() {
        let rl = limits(
            Quota {
                max: 1,
                window: Duration::from_secs(60),
            },
            vec![],
            false,
        );
        for _ in 0..50 {
            rl.check(Category::Write, ip("10.0.0.1")).unwrap();
        }
    }

    #[test]
    fn window_resets_after_elapsing() {
        let rl = limits(
            Quota {
                max: 2,
                window: Duration::from_millis(40),
            },
            vec![],
            true,
        );
        let client = ip("10.0.0.1");
        rl.check(Category::Search, client).unwrap();
        rl.check(Category::Search, client).unwrap();
        assert!(rl.check(Category::Search, client).is_err());
        std::thread::sleep(Duration::from_millis(60));
        rl.check(Category::Search, client).unwrap();
    }
}
