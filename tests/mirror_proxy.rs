//! End-to-end tests: real proxy, loopback mock upstreams.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{header, StatusCode};
use mirror_proxy::config::{RewriteConfig, UpstreamMode};
use mirror_proxy::rewrite::{BodyRewriter, RewriteRuleset, HOVER_SCRIPT};

mod common;
use common::{MockResponse, ReceivedRequest};

const ARTICLE: &str = "<html><body><a href=\"https://wikipedia.org/wiki/Foo\">Foo</a> \
                       <a href=\"https://en.wikipedia.org/wiki/Bar\">Bar</a></body></html>";

fn rewriter() -> BodyRewriter {
    let ruleset = RewriteRuleset::from_config(&RewriteConfig::default().rules).unwrap();
    BodyRewriter::new(ruleset, true)
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[tokio::test]
async fn test_html_rewritten_and_request_directed() {
    let upstream = addr(29101);
    let proxy = addr(29102);

    let seen: Arc<Mutex<Option<ReceivedRequest>>> = Arc::new(Mutex::new(None));
    let seen_by_backend = seen.clone();
    common::start_programmable_backend(upstream, move |req| {
        *seen_by_backend.lock().unwrap() = Some(req);
        async move { MockResponse::new(200, ARTICLE).header("Content-Type", "text/html") }
    })
    .await;

    let shutdown = common::start_proxy(common::config_for(proxy, upstream)).await;

    let res = common::client()
        .get(format!("http://{}/wiki/Foo?action=view", proxy))
        .header("Accept-Encoding", "gzip")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    let declared: usize = res.headers()[header::CONTENT_LENGTH].to_str().unwrap().parse().unwrap();
    assert!(res.headers().contains_key("x-request-id"));

    let body = res.text().await.unwrap();
    assert_eq!(declared, body.len());
    assert_eq!(body, rewriter().rewrite(ARTICLE));
    assert!(body.contains("https://m-wikipedia.org/wiki/Foo"));
    assert!(body.contains("https://en.m-wikipedia.org/wiki/Bar"));
    assert!(!body.contains("https://wikipedia.org"));
    assert!(body.contains(HOVER_SCRIPT));

    let req = seen.lock().unwrap().clone().expect("upstream not hit");
    assert_eq!(req.path(), "/wiki/Foo?action=view");
    assert_eq!(req.header("host"), Some("127.0.0.1:29101"));
    assert_eq!(req.header("accept-encoding"), Some("identity"));
    assert_eq!(req.header("accept-charset"), Some("utf-8"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_redirect_resolved_with_single_hop() {
    let upstream = addr(29201);
    let target = addr(29202);
    let further = addr(29203);
    let proxy = addr(29204);

    common::start_mock_backend(
        upstream,
        MockResponse::new(302, "").header("Location", &format!("http://{}/Foo", target)),
    )
    .await;

    let target_hits = Arc::new(AtomicU32::new(0));
    let th = target_hits.clone();
    common::start_programmable_backend(target, move |_| {
        th.fetch_add(1, Ordering::SeqCst);
        async move { MockResponse::new(200, ARTICLE).header("Content-Type", "text/html") }
    })
    .await;

    let further_hits = Arc::new(AtomicU32::new(0));
    let fh = further_hits.clone();
    common::start_programmable_backend(further, move |_| {
        fh.fetch_add(1, Ordering::SeqCst);
        async move { MockResponse::new(200, "never") }
    })
    .await;

    let shutdown = common::start_proxy(common::config_for(proxy, upstream)).await;

    let res = common::client()
        .get(format!("http://{}/wiki/Old", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(header::LOCATION).is_none());
    let body = res.text().await.unwrap();
    assert_eq!(body, rewriter().rewrite(ARTICLE));
    assert_eq!(target_hits.load(Ordering::SeqCst), 1);
    assert_eq!(further_hits.load(Ordering::SeqCst), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_chained_redirect_surfaces_intermediate_page() {
    let upstream = addr(29301);
    let hop = addr(29302);
    let further = addr(29303);
    let proxy = addr(29304);

    common::start_mock_backend(
        upstream,
        MockResponse::new(301, "").header("Location", &format!("http://{}/hop", hop)),
    )
    .await;
    common::start_mock_backend(
        hop,
        MockResponse::new(307, "<body>moving on</body>")
            .header("Location", &format!("http://{}/final", further))
            .header("X-Hop", "1"),
    )
    .await;

    let further_hits = Arc::new(AtomicU32::new(0));
    let fh = further_hits.clone();
    common::start_programmable_backend(further, move |_| {
        fh.fetch_add(1, Ordering::SeqCst);
        async move { MockResponse::new(200, "final") }
    })
    .await;

    let shutdown = common::start_proxy(common::config_for(proxy, upstream)).await;

    let res = common::client()
        .get(format!("http://{}/", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(header::LOCATION).is_none());
    assert_eq!(res.headers()["x-hop"], "1");
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(res.text().await.unwrap(), rewriter().rewrite("<body>moving on</body>"));
    assert_eq!(further_hits.load(Ordering::SeqCst), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_relative_redirect_resolved_against_upstream() {
    let upstream = addr(29401);
    let proxy = addr(29402);

    common::start_programmable_backend(upstream, |req| {
        let response = if req.path() == "/new" {
            MockResponse::new(200, "<body>new home</body>").header("Content-Type", "text/html; charset=utf-8")
        } else {
            MockResponse::new(308, "").header("Location", "/new")
        };
        async move { response }
    })
    .await;

    let shutdown = common::start_proxy(common::config_for(proxy, upstream)).await;

    let res = common::client()
        .get(format!("http://{}/old", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), rewriter().rewrite("<body>new home</body>"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_json_passes_through() {
    let upstream = addr(29501);
    let proxy = addr(29502);

    let json = r#"{"url":"https://wikipedia.org/","tag":"</body>"}"#;
    common::start_mock_backend(
        upstream,
        MockResponse::new(200, json).header("Content-Type", "application/json"),
    )
    .await;

    let shutdown = common::start_proxy(common::config_for(proxy, upstream)).await;

    let res = common::client()
        .get(format!("http://{}/api", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(res.text().await.unwrap(), json);

    shutdown.trigger();
}

#[tokio::test]
async fn test_redirect_failure_isolated_from_other_requests() {
    let upstream = addr(29601);
    let proxy = addr(29602);

    common::start_programmable_backend(upstream, |req| {
        let slow = req.path() == "/slow";
        async move {
            if slow {
                tokio::time::sleep(Duration::from_millis(500)).await;
                MockResponse::new(200, "slow ok").header("Content-Type", "text/plain")
            } else {
                // Nothing listens on port 1.
                MockResponse::new(302, "").header("Location", "http://127.0.0.1:1/gone")
            }
        }
    })
    .await;

    let shutdown = common::start_proxy(common::config_for(proxy, upstream)).await;
    let client = common::client();

    let slow_client = client.clone();
    let slow_url = format!("http://{}/slow", proxy);
    let slow = tokio::spawn(async move { slow_client.get(&slow_url).send().await });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let broken = client
        .get(format!("http://{}/broken", proxy))
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(broken.status(), StatusCode::BAD_GATEWAY);
    assert!(broken.text().await.unwrap().starts_with("proxy error:"));

    let slow = slow.await.unwrap().expect("slow request failed");
    assert_eq!(slow.status(), StatusCode::OK);
    assert_eq!(slow.text().await.unwrap(), "slow ok");

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_down_is_bad_gateway() {
    let proxy = addr(29702);
    // No upstream listening on 29701.
    let shutdown = common::start_proxy(common::config_for(proxy, addr(29701))).await;

    let res = common::client()
        .get(format!("http://{}/", proxy))
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}

#[tokio::test]
async fn test_mobile_mode_only_swaps_user_agent() {
    let upstream = addr(29801);
    let proxy = addr(29802);

    let seen: Arc<Mutex<Option<ReceivedRequest>>> = Arc::new(Mutex::new(None));
    let seen_by_backend = seen.clone();
    common::start_programmable_backend(upstream, move |req| {
        *seen_by_backend.lock().unwrap() = Some(req);
        async move { MockResponse::new(200, ARTICLE).header("Content-Type", "text/html") }
    })
    .await;

    let mut config = common::config_for(proxy, upstream);
    config.upstream.mode = UpstreamMode::Mobile;
    config.upstream.mobile_user_agent = "TestPhone/1.0 Mobile".into();
    let shutdown = common::start_proxy(config).await;

    let res = common::client()
        .get(format!("http://{}/wiki/Foo", proxy))
        .header("User-Agent", "Desktop/1.0")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), ARTICLE);

    let req = seen.lock().unwrap().clone().expect("upstream not hit");
    assert_eq!(req.header("user-agent"), Some("TestPhone/1.0 Mobile"));
    assert_eq!(req.header("host"), Some("127.0.0.1:29801"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_silent_upstream_is_gateway_timeout() {
    let upstream = addr(29901);
    let proxy = addr(29902);

    common::start_silent_backend(upstream).await;

    let mut config = common::config_for(proxy, upstream);
    config.timeouts.request_secs = 1;
    let shutdown = common::start_proxy(config).await;

    let res = common::client()
        .get(format!("http://{}/", proxy))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(res.text().await.unwrap().starts_with("proxy error: upstream did not answer"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_oversized_redirect_target_rejected() {
    let upstream = addr(30001);
    let target = addr(30002);
    let proxy = addr(30003);

    common::start_mock_backend(
        upstream,
        MockResponse::new(302, "").header("Location", &format!("http://{}/big", target)),
    )
    .await;
    common::start_mock_backend(
        target,
        MockResponse::new(200, "x".repeat(10_000)).header("Content-Type", "text/html"),
    )
    .await;

    let mut config = common::config_for(proxy, upstream);
    config.limits.max_body_bytes = 100;
    let shutdown = common::start_proxy(config).await;

    let res = common::client()
        .get(format!("http://{}/", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(res.text().await.unwrap().contains("exceeds 100 bytes"));

    shutdown.trigger();
}
