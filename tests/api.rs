//! End-to-end tests: a client and a server derived from the same description, connected through
//! an in-process `tide` server.

use futures::future::join_all;
use net_api::server::server;
use net_api::{client, get, post, segment, Api, ClientError, Handler, HandlerError, Router, Transport};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
    tags: Vec<String>,
    manager: Option<Box<User>>,
}

fn user(id: u64, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
        tags: vec![],
        manager: None,
    }
}

fn base() -> Url {
    Url::parse("http://localhost:8080/").unwrap()
}

fn connect(router: Router) -> Transport {
    Transport::with_client(surf::Client::with_http_client(server(router)))
}

#[async_std::test]
async fn users_api_round_trip() {
    let api = segment("users", get::<Vec<User>>().or(post::<User, User>()))
        .or(segment("health", get::<String>()));
    let router = Router::new(
        &api,
        (
            (
                Handler::new(|()| async { Ok(vec![user(1, "alice"), user(2, "bob")]) }),
                Handler::new(|new: User| async move {
                    if new.name.is_empty() {
                        Err(HandlerError::bad_request("name must not be empty"))
                    } else {
                        Ok(new)
                    }
                }),
            ),
            Handler::new(|()| async { Ok("ok".to_string()) }),
        ),
    );
    let ((list_users, create_user), health) = client(&api, &connect(router));

    assert_eq!(
        list_users.call(&base()).await.unwrap(),
        vec![user(1, "alice"), user(2, "bob")]
    );
    assert_eq!(health.call(&base()).await.unwrap(), "ok");

    let mut carol = user(3, "carol");
    carol.tags = vec!["admin".into(), "émoji ✓".into()];
    carol.manager = Some(Box::new(user(1, "alice")));
    assert_eq!(create_user.call(&base(), &carol).await.unwrap(), carol);

    let err = create_user.call(&base(), &user(4, "")).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("name must not be empty"));
}

#[async_std::test]
async fn echo_returns_values_unchanged() {
    let api = segment("echo", post::<serde_json::Value, serde_json::Value>());
    let router = Router::new(&api, Handler::new(|value| async move { Ok(value) }));
    let echo = client(&api, &connect(router));

    let values = vec![
        serde_json::json!(null),
        serde_json::json!(0),
        serde_json::json!(-17.5),
        serde_json::json!(""),
        serde_json::json!("line\nbreak \"quoted\""),
        serde_json::json!([]),
        serde_json::json!([1, [2, [3]]]),
        serde_json::json!({"nested": {"list": [true, false], "empty": {}}}),
    ];
    for value in values {
        assert_eq!(echo.call(&base(), &value).await.unwrap(), value);
    }
}

#[async_std::test]
async fn alternatives_route_to_second_branch() {
    let api = segment("a", get::<i64>()).or(segment("b", get::<i64>()));
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (first_calls, second_calls) = (first.clone(), second.clone());
    let router = Router::new(
        &api,
        (
            Handler::new(move |()| {
                first_calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }
            }),
            Handler::new(move |()| {
                second_calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(2) }
            }),
        ),
    );
    let (_, b) = client(&api, &connect(router));

    assert_eq!(b.call(&base()).await.unwrap(), 2);
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[async_std::test]
async fn base_address_with_path_prefix() {
    let api = segment("api", segment("version", get::<String>()));
    let router = Router::new(&api, Handler::new(|()| async { Ok("1.0".to_string()) }));
    let transport = connect(router);

    // The client only knows the inner endpoint; the prefix comes from the base address.
    let version = client(&segment("version", get::<String>()), &transport);
    let prefixed = Url::parse("http://localhost:8080/api/").unwrap();
    assert_eq!(version.call(&prefixed).await.unwrap(), "1.0");

    let unprefixed = Url::parse("http://localhost:8080/api").unwrap();
    assert_eq!(version.call(&unprefixed).await.unwrap(), "1.0");

    let elsewhere = Url::parse("http://localhost:8080/other/").unwrap();
    let err = version.call(&elsewhere).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[async_std::test]
async fn labels_with_reserved_characters_round_trip() {
    let api = segment("café", get::<u32>())
        .or(segment("a b", get::<u32>()))
        .or(segment("a?b", get::<u32>()))
        .or(segment("a/b", segment("c#d", get::<u32>())))
        .or(segment("100%", get::<u32>()))
        .or(segment("a", segment("b", get::<u32>())));
    let router = Router::new(
        &api,
        (
            (
                (
                    (
                        (
                            Handler::new(|()| async { Ok(1) }),
                            Handler::new(|()| async { Ok(2) }),
                        ),
                        Handler::new(|()| async { Ok(3) }),
                    ),
                    Handler::new(|()| async { Ok(4) }),
                ),
                Handler::new(|()| async { Ok(5) }),
            ),
            Handler::new(|()| async { Ok(6) }),
        ),
    );
    let (((((cafe, space), question), slash), percent), nested) = client(&api, &connect(router));

    assert_eq!(cafe.call(&base()).await.unwrap(), 1);
    assert_eq!(space.call(&base()).await.unwrap(), 2);
    assert_eq!(question.call(&base()).await.unwrap(), 3);
    assert_eq!(slash.call(&base()).await.unwrap(), 4);
    assert_eq!(percent.call(&base()).await.unwrap(), 5);
    // An encoded slash is one segment, so "a/b" and "a" then "b" stay distinct routes.
    assert_eq!(nested.call(&base()).await.unwrap(), 6);
}

#[async_std::test]
async fn concurrent_calls_share_a_transport() {
    let api = segment("count", post::<u32, u32>());
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let router = Router::new(
        &api,
        Handler::new(move |n: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n * 2) }
        }),
    );
    let double = client(&api, &connect(router));

    let base = base();
    let inputs = (0..32).collect::<Vec<u32>>();
    let results = join_all(inputs.iter().map(|n| double.call(&base, n))).await;
    let results = results
        .into_iter()
        .collect::<Result<Vec<_>, ClientError>>()
        .unwrap();
    assert_eq!(results, inputs.iter().map(|n| n * 2).collect::<Vec<_>>());
    assert_eq!(seen.load(Ordering::SeqCst), 32);
}

#[async_std::test]
async fn mismatched_client_never_decodes() {
    let served = segment("items", get::<Vec<u32>>());
    let router = Router::new(&served, Handler::new(|()| async { Ok(vec![1, 2]) }));
    let transport = connect(router);

    let wrong_type = client(&segment("items", get::<User>()), &transport);
    assert!(matches!(
        wrong_type.call(&base()).await,
        Err(ClientError::InvalidResponseBody { .. })
    ));

    let wrong_method = client(&segment("items", post::<u32, Vec<u32>>()), &transport);
    let err = wrong_method.call(&base(), &1).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("404"));
}
