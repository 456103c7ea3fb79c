// SPDX-License-Identifier: MIT OR Apache-2.0
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use gerr_handler::combinators::{
    handle_not_wrapped, map_status_code, stream_app_error_handler, stream_fn,
    unary_app_error_handler, unary_fn,
};
use gerr_handler::{
    AppError, BoxError, ChainBuilder, StatusCodeMap, StreamContext, StreamErrorHandler,
    StreamServerInfo, UnaryContext, UnaryErrorHandler, UnaryServerInfo,
};
use gerr_interceptor::{
    ChannelStream, ErrorInterceptors, ServerStream, StreamErrorInterceptor, UnaryErrorInterceptor,
};
use std::sync::{Arc, Mutex};
use tonic::{Code, Request, Response, Status};

const ECHO: UnaryServerInfo = UnaryServerInfo::new("/test.Echo/Say");
const CHAT: StreamServerInfo = StreamServerInfo::bidi("/test.Echo/Chat");

type Inbound = BoxStream<'static, Result<String, Status>>;

fn inbound(messages: &[&str]) -> Request<Inbound> {
    let items: Vec<Result<String, Status>> =
        messages.iter().map(|m| Ok(m.to_string())).collect();
    Request::new(stream::iter(items).boxed())
}

fn app(code: i32) -> BoxError {
    Box::new(AppError::<i32>::msg("application failure").with_status_code(code))
}

// -----------------------------------------------------------------------
// Unary
// -----------------------------------------------------------------------

#[tokio::test]
async fn unary_success_is_untouched() {
    let calls = Arc::new(Mutex::new(0));
    let seen = calls.clone();
    let chain = ChainBuilder::new()
        .both(handle_not_wrapped::<i32, _>(move |_view, err| {
            *seen.lock().unwrap() += 1;
            Some(err)
        }))
        .build();
    let interceptor = UnaryErrorInterceptor::new(&chain);

    let resp = interceptor
        .intercept(Request::new("hi".to_string()), &ECHO, |req| async move {
            Ok::<_, BoxError>(Response::new(format!("{}!", req.into_inner())))
        })
        .await
        .unwrap();

    assert_eq!(resp.into_inner(), "hi!");
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn unary_error_is_mapped() {
    let chain = ChainBuilder::new()
        .both(map_status_code(
            StatusCodeMap::new(Code::Internal).with(50, Code::PermissionDenied),
        ))
        .build();
    let interceptor = UnaryErrorInterceptor::new(&chain);

    let status = interceptor
        .intercept(Request::new(()), &ECHO, |_req| async {
            Err::<Response<()>, _>(app(50))
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::PermissionDenied);
    assert_eq!(status.message(), "application failure");
}

#[tokio::test]
async fn unary_handlers_see_request_and_metadata() {
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let chain = ChainBuilder::new()
        .unary(unary_app_error_handler(
            move |ctx: &UnaryContext<'_>, err: Box<AppError<i32>>| {
                let tenant = ctx
                    .metadata
                    .get("x-tenant")
                    .map(|v| v.to_str().unwrap().to_string());
                *sink.lock().unwrap() = Some((
                    ctx.request::<String>().cloned(),
                    tenant,
                    ctx.info.full_method,
                ));
                let err: BoxError = err;
                Some(err)
            },
        ))
        .build();
    let interceptor = UnaryErrorInterceptor::new(&chain);

    let mut request = Request::new("payload".to_string());
    request.metadata_mut().insert("x-tenant", "acme".parse().unwrap());
    let status = interceptor
        .intercept(request, &ECHO, |_req| async {
            Err::<Response<String>, _>(app(1))
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unknown);
    let (message, tenant, method) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(message.as_deref(), Some("payload"));
    assert_eq!(tenant.as_deref(), Some("acme"));
    assert_eq!(method, "/test.Echo/Say");
}

#[tokio::test]
async fn unary_resolved_error_returns_default_response() {
    let swallow: Arc<dyn UnaryErrorHandler> = Arc::new(unary_fn(|_ctx, _err| None));
    let interceptor = UnaryErrorInterceptor::with_handlers(vec![swallow]);

    let resp = interceptor
        .intercept(Request::new(1_u32), &ECHO, |_req| async {
            Err::<Response<String>, BoxError>("benign".into())
        })
        .await
        .unwrap();

    assert_eq!(resp.into_inner(), "");
}

#[tokio::test]
async fn unary_without_handlers_reports_unknown() {
    let interceptor = UnaryErrorInterceptor::new(&ChainBuilder::new().build());
    let status = interceptor
        .intercept(Request::new(()), &ECHO, |_req| async {
            Err::<Response<()>, BoxError>("plain".into())
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unknown);
    assert_eq!(status.message(), "plain");
}

// -----------------------------------------------------------------------
// Streaming
// -----------------------------------------------------------------------

type Observed = Arc<Mutex<Option<(Option<String>, Option<String>)>>>;

fn observing_chain(observed: &Observed) -> gerr_handler::HandlerChain {
    let sink = observed.clone();
    ChainBuilder::new()
        .stream(stream_fn(move |ctx: &StreamContext<'_>, err| {
            *sink.lock().unwrap() = Some((
                ctx.request::<String>().cloned(),
                ctx.response::<String>().cloned(),
            ));
            Some(err)
        }))
        .build()
}

#[tokio::test]
async fn stream_handlers_see_last_messages() {
    let observed: Observed = Arc::default();
    let interceptor = StreamErrorInterceptor::new(&observing_chain(&observed));
    let (stream, _responses) =
        ChannelStream::<String, String>::channel(inbound(&["A-in", "B"]), 8);

    let status = interceptor
        .intercept(stream, &CHAT, |s| {
            async move {
                s.send("early".to_string()).await?;
                s.recv().await?;
                s.send("A".to_string()).await?;
                s.recv().await?;
                Err::<(), BoxError>(app(7))
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unknown);
    let (request, response) = observed.lock().unwrap().clone().unwrap();
    assert_eq!(request.as_deref(), Some("B"));
    assert_eq!(response.as_deref(), Some("A"));
}

#[tokio::test]
async fn stream_without_traffic_sees_nothing() {
    let observed: Observed = Arc::default();
    let interceptor = StreamErrorInterceptor::new(&observing_chain(&observed));
    let (stream, _responses) = ChannelStream::<String, String>::channel(inbound(&[]), 1);

    interceptor
        .intercept(stream, &CHAT, |_s| async { Err::<(), BoxError>(app(7)) }.boxed())
        .await
        .unwrap_err();

    assert_eq!(*observed.lock().unwrap(), Some((None, None)));
}

#[tokio::test]
async fn stream_success_skips_handlers() {
    let observed: Observed = Arc::default();
    let interceptor = StreamErrorInterceptor::new(&observing_chain(&observed));
    let (stream, responses) = ChannelStream::<String, String>::channel(inbound(&["ping"]), 4);

    interceptor
        .intercept(stream, &CHAT, |s| {
            async move {
                while let Some(msg) = s.recv().await? {
                    s.send(format!("{msg}-pong")).await?;
                }
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap();

    let out: Vec<_> = responses.map(|r| r.unwrap()).collect().await;
    assert_eq!(out, vec!["ping-pong"]);
    assert!(observed.lock().unwrap().is_none());
}

#[tokio::test]
async fn stream_app_error_mapped_with_context() {
    let chain = ChainBuilder::new()
        .stream(stream_app_error_handler(
            |ctx: &StreamContext<'_>, err: Box<AppError<i32>>| {
                assert_eq!(ctx.info.full_method, "/test.Echo/Chat");
                let err: BoxError = err;
                Some(err)
            },
        ))
        .both(map_status_code(
            StatusCodeMap::new(Code::Internal).with(7, Code::FailedPrecondition),
        ))
        .build();
    let interceptor = StreamErrorInterceptor::new(&chain);
    let (stream, _responses) = ChannelStream::<String, String>::channel(inbound(&[]), 1);

    let status = interceptor
        .intercept(stream, &CHAT, |_s| async { Err::<(), BoxError>(app(7)) }.boxed())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);
}

#[tokio::test]
async fn spawned_stream_delivers_error_as_last_item() {
    let chain = ChainBuilder::new()
        .both(map_status_code(
            StatusCodeMap::new(Code::Internal).with(9, Code::ResourceExhausted),
        ))
        .build();
    let interceptors = ErrorInterceptors::from(&chain);

    let responses =
        interceptors
            .stream
            .spawn::<String, String, _, _>(inbound(&["x", "y"]), CHAT, 4, |s| {
                async move {
                    let first = s.recv().await?.unwrap_or_default();
                    s.send(format!("got {first}")).await?;
                    Err::<(), BoxError>(app(9))
                }
                .boxed()
            });

    let items: Vec<Result<String, Status>> = responses.collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "got x");
    assert_eq!(items[1].as_ref().unwrap_err().code(), Code::ResourceExhausted);
}

#[tokio::test]
async fn spawned_stream_panic_ends_with_internal_status() {
    let interceptors = ErrorInterceptors::from(&ChainBuilder::new().build());

    let responses =
        interceptors
            .stream
            .spawn::<String, String, _, _>(inbound(&[]), CHAT, 4, |s| {
                async move {
                    s.send("partial".to_string()).await?;
                    let id = None::<u32>.expect("order id");
                    s.send(format!("order {id}")).await?;
                    Ok::<(), BoxError>(())
                }
                .boxed()
            });

    let items: Vec<Result<String, Status>> = responses.collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "partial");
    assert_eq!(items[1].as_ref().unwrap_err().code(), Code::Internal);
}

#[tokio::test]
async fn panicking_handler_ends_spawned_stream_with_internal_status() {
    let chain = ChainBuilder::new()
        .stream(stream_fn(|_ctx, _err| panic!("handler bug")))
        .build();
    let interceptors = ErrorInterceptors::from(&chain);

    let responses = interceptors
        .stream
        .spawn::<String, String, _, _>(inbound(&[]), CHAT, 1, |_s| {
            async { Err::<(), BoxError>(app(3)) }.boxed()
        });

    let items: Vec<Result<String, Status>> = responses.collect().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap_err().code(), Code::Internal);
}

#[tokio::test]
async fn resolved_stream_error_completes_cleanly() {
    let swallow: Arc<dyn StreamErrorHandler> = Arc::new(stream_fn(|_ctx, _err| None));
    let interceptor = StreamErrorInterceptor::with_handlers(vec![swallow]);
    let (stream, _responses) = ChannelStream::<String, String>::channel(inbound(&[]), 1);
    interceptor
        .intercept(stream, &CHAT, |_s| async { Err::<(), BoxError>("eof".into()) }.boxed())
        .await
        .unwrap();
}
