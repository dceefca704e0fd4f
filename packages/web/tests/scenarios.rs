//! End-to-end scenarios: mount a small site and drive it through the
//! router with real requests.

use std::sync::{Arc, Mutex};

use std::io::Write;

use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use axum::Router;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use hypertree_web::{
    mount, DataOutcome, LazyCallable, MountOptions, Next, NodeBuilder, NodeView, Page,
    PageMiddleware, PathParams, RenderContext, RenderFn, RenderTarget, RenderTargetSelector,
    SelectError, SelectRequest, UrlArgs,
};
use tower::ServiceExt;

#[derive(Default)]
struct Site;

impl Page for Site {
    fn configure(&self, node: &mut NodeBuilder<Self>) {
        node.component("Page", |_: &Site| "site home".to_string())
            .child::<About>("GET /about About us")
            .child::<Items>("/items")
            .child::<Missing>("/missing");
    }
}

#[derive(Default)]
struct About;

impl Page for About {
    fn configure(&self, node: &mut NodeBuilder<Self>) {
        node.component("Page", |_: &About| "full about page".to_string())
            .component("Stats", |_: &About| "about stats".to_string())
            .component("Nav", |_: &About| {
                RenderFn(|ctx: &RenderContext, out: &mut dyn Write| {
                    let url = ctx.url_for("about", &UrlArgs::new())?;
                    write!(out, "<a href=\"{url}\">{}</a>", ctx.title())?;
                    Ok(())
                })
            });
    }
}

/// Structural grouping node: no components, only a child.
#[derive(Default)]
struct Items;

impl Page for Items {
    fn configure(&self, node: &mut NodeBuilder<Self>) {
        node.child::<ItemDetail>("GET /{id}");
    }
}

#[derive(Default)]
struct ItemDetail;

impl Page for ItemDetail {
    fn configure(&self, node: &mut NodeBuilder<Self>) {
        node.component("Page", |_: &ItemDetail, msg: String| msg)
            .data("PageData", |_: &ItemDetail, params: PathParams| {
                match params.get("id") {
                    Some("42") => DataOutcome::values(("item 42".to_string(),)),
                    _ => DataOutcome::redirect_with::<Missing>(
                        "Page",
                        ("not found".to_string(),),
                    ),
                }
            });
    }
}

#[derive(Default)]
struct Missing;

impl Page for Missing {
    fn configure(&self, node: &mut NodeBuilder<Self>) {
        node.component("Page", |_: &Missing, msg: String| msg);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("hypertree_web=debug")
        .try_init();
}

fn site() -> Router {
    init_tracing();
    let (router, _) = mount(Router::new(), Site, "/", "Site", MountOptions::new()).unwrap();
    router
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_partial(uri: &str, fragment: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("hx-request", "true")
        .header("hx-target", fragment)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn child_route_serves_its_page() {
    let response = site().oneshot(get("/about")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/html; charset=utf-8"
    );
    assert_eq!(body_text(response).await, "full about page");
}

#[tokio::test]
async fn full_request_renders_default_component_despite_other_components() {
    let response = site().oneshot(get("/about")).await.unwrap();
    assert_eq!(body_text(response).await, "full about page");
}

#[tokio::test]
async fn partial_request_renders_the_named_fragment() {
    let response = site()
        .oneshot(get_partial("/about", "#stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "about stats");
}

#[tokio::test]
async fn partial_fallback_to_full_page_retargets_the_body() {
    let response = site()
        .oneshot(get_partial("/about", "#no-such-fragment"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["hx-retarget"], "body");
    assert_eq!(body_text(response).await, "full about page");
}

#[tokio::test]
async fn component_generates_urls_from_its_context() {
    let response = site().oneshot(get_partial("/about", "#nav")).await.unwrap();
    assert_eq!(
        body_text(response).await,
        "<a href=\"/about\">About us</a>"
    );
}

#[tokio::test]
async fn data_operation_feeds_the_component() {
    let response = site().oneshot(get("/items/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "item 42");
}

#[tokio::test]
async fn data_operation_override_renders_another_nodes_component() {
    let response = site().oneshot(get("/items/7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "not found");
}

#[tokio::test]
async fn structural_node_has_no_route() {
    let response = site().oneshot(get("/items")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_verb_is_rejected() {
    let request = Request::builder()
        .method("POST")
        .uri("/about")
        .body(Body::empty())
        .unwrap();
    let response = site().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// ---------------------------------------------------------------------------
// Error boundary
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Flaky;

impl Page for Flaky {
    fn configure(&self, node: &mut NodeBuilder<Self>) {
        node.component("Page", |_: &Flaky| "never rendered".to_string())
            .data("PageData", |_: &Flaky| {
                DataOutcome::fail(anyhow::anyhow!("backend down"))
            });
    }
}

#[tokio::test]
async fn failed_data_operation_reaches_the_error_handler() {
    use axum::response::IntoResponse;

    let options = MountOptions::new().with_error_handler(|_info, err| {
        (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response()
    });
    let (router, _) = mount(Router::new(), Flaky, "/", "", options).unwrap();
    let response = router.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_text(response).await;
    assert!(body.contains("PageData"), "{body}");
}

// ---------------------------------------------------------------------------
// Registry seeding
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct ApiKey(String);

#[derive(Clone)]
struct DbName(String);

#[derive(Default)]
struct Config;

impl Page for Config {
    fn configure(&self, node: &mut NodeBuilder<Self>) {
        node.component("Page", |_: &Config, key: ApiKey, db: DbName| {
            format!("{}/{}", key.0, db.0)
        });
    }
}

#[tokio::test]
async fn distinct_newtypes_seed_and_inject() {
    let options = MountOptions::new()
        .provide(ApiKey("k1".to_string()))
        .provide(DbName("main".to_string()));
    let (router, _) = mount(Router::new(), Config, "/", "", options).unwrap();
    let response = router.oneshot(get("/")).await.unwrap();
    assert_eq!(body_text(response).await, "k1/main");
}

#[test]
fn colliding_seed_types_fail_the_mount() {
    let options = MountOptions::new()
        .provide("first".to_string())
        .provide("second".to_string());
    assert!(mount(Router::new(), Config, "/", "", options).is_err());
}

// ---------------------------------------------------------------------------
// Empty nodes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Hollow;

impl Page for Hollow {
    fn configure(&self, _node: &mut NodeBuilder<Self>) {}
}

#[derive(Default)]
struct WithHollow;

impl Page for WithHollow {
    fn configure(&self, node: &mut NodeBuilder<Self>) {
        node.component("Page", |_: &WithHollow| "root".to_string())
            .child::<Hollow>("/hollow");
    }
}

#[tokio::test]
async fn empty_leaf_diagnosed_once_by_name_and_unrouted() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let options = MountOptions::new().on_empty_node(move |node| {
        sink.lock().unwrap().push(node.name.clone());
    });
    let (router, _) = mount(Router::new(), WithHollow, "/", "", options).unwrap();
    assert_eq!(*seen.lock().unwrap(), ["hollow"]);

    let response = router.oneshot(get("/hollow")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Custom selector with a lazy callable
// ---------------------------------------------------------------------------

/// Offers a free-standing sidebar callable to every partial request; the
/// handler renders it only when the fragment actually names it.
struct SidebarSelector;

impl RenderTargetSelector for SidebarSelector {
    fn select(
        &self,
        req: &SelectRequest,
        _node: &NodeView<'_>,
    ) -> Result<RenderTarget, SelectError> {
        if req.partial {
            Ok(RenderTarget::Callable(LazyCallable::new(
                "Sidebar",
                |ctx: &RenderContext, out: &mut dyn Write| {
                    write!(out, "sidebar of {}", ctx.node().name)?;
                    Ok(())
                },
            )))
        } else {
            Ok(RenderTarget::component("Page"))
        }
    }
}

fn sidebar_site() -> Router {
    init_tracing();
    let options = MountOptions::new().with_selector(SidebarSelector);
    let (router, _) = mount(Router::new(), Site, "/", "Site", options).unwrap();
    router
}

#[tokio::test]
async fn matching_fragment_renders_the_callable() {
    let response = sidebar_site()
        .oneshot(get_partial("/about", "#sidebar"))
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "sidebar of about");
}

#[tokio::test]
async fn unmatched_callable_falls_back_to_the_full_page() {
    let response = sidebar_site()
        .oneshot(get_partial("/about", "#something-else"))
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "full about page");
}

// ---------------------------------------------------------------------------
// Middleware inheritance
// ---------------------------------------------------------------------------

struct Tag(&'static str);

#[async_trait]
impl PageMiddleware for Tag {
    async fn handle(&self, req: Request<Body>, next: Next) -> Response {
        let mut response = next.run(req).await;
        response
            .headers_mut()
            .append("x-tag", self.0.parse().unwrap());
        response
    }
}

#[derive(Default)]
struct Guarded;

impl Page for Guarded {
    fn configure(&self, node: &mut NodeBuilder<Self>) {
        node.component("Page", |_: &Guarded| "guarded".to_string())
            .middlewares(|_: &Guarded| {
                vec![Arc::new(Tag("parent")) as Arc<dyn PageMiddleware>]
            })
            .child::<Inner>("/inner");
    }
}

#[derive(Default)]
struct Inner;

impl Page for Inner {
    fn configure(&self, node: &mut NodeBuilder<Self>) {
        node.component("Page", |_: &Inner| "inner".to_string())
            .middlewares(|_: &Inner| {
                vec![Arc::new(Tag("child")) as Arc<dyn PageMiddleware>]
            });
    }
}

#[tokio::test]
async fn descendants_inherit_ancestor_middleware() {
    let (router, _) = mount(Router::new(), Guarded, "/", "", MountOptions::new()).unwrap();
    let response = router.oneshot(get("/inner")).await.unwrap();
    let tags: Vec<_> = response
        .headers()
        .get_all("x-tag")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    // Innermost appends first; the parent tag lands last.
    assert_eq!(tags, vec!["child", "parent"]);
    assert_eq!(body_text(response).await, "inner");
}
