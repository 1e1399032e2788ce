//! Dispatcher: the four-stage core request lifecycle (prepare, process,
//! finalize, dispatch) every transport adapter drives a request through.

use crate::event_router::EmitStatus;
use crate::plugin::PluginHost;
use crate::request::Request;
use crate::response::Response;

/// Runs one request through the full lifecycle described in §4.6:
/// `"request"` → `"METHOD PATH"` (falling back to `"METHOD /**"`, then a
/// synthesized 404) → `"response"` → `dispatch()`. An abort during
/// prepare skips straight to dispatch; an abort during process or
/// finalize stops only that stage, later stages still run.
pub async fn handle(host: &PluginHost, req: &mut Request, res: &mut Response) {
    let router = host.router();
    let route_key = format!("{} {}", req.method.as_str(), req.url.path());

    crate::debug!("[dispatch] prepare");
    let prepare_status = router.emit("request", req, res, host).await;

    // A short-circuit during prepare skips straight to the dispatch
    // stage; process/finalize never run for this request.
    if prepare_status != EmitStatus::Aborted {
        crate::debug!("[dispatch] process {route_key}");
        router.emit(&route_key, req, res, host).await;

        if res.body_unset() {
            let fallback_key = format!("{} /**", req.method.as_str());
            router.emit(&fallback_key, req, res, host).await;

            if res.body_unset() {
                res.set_status(404, "Not Found");
                res.set_html("404 Not Found");
            }
        }

        crate::debug!("[dispatch] finalize");
        router.emit("response", req, res, host).await;
    }

    crate::debug!("[dispatch] dispatch sent={}", res.sent);
    if !res.sent {
        if let Err(e) = res.dispatch().await {
            crate::error!("[dispatch] {route_key} failed to send: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{listener, Action, Outcome};
    use crate::request::{Headers, Method};

    fn mk_request(path: &str) -> Request {
        Request::new(
            Method::Get,
            url::Url::parse(&format!("http://localhost{path}")).unwrap(),
            Headers::new(),
            None,
        )
    }

    #[tokio::test]
    async fn unmatched_route_falls_back_to_synthesized_404() {
        let host = PluginHost::new();
        let mut req = mk_request("/nope");
        let mut res = Response::new(None);
        handle(&host, &mut req, &mut res).await;
        assert_eq!(res.code, 404);
        assert!(res.sent);
    }

    #[tokio::test]
    async fn glob_fallback_runs_before_synthesized_404() {
        let host = PluginHost::new();
        host.on(
            "GET /**",
            Action::Callable(listener(|_, res, _| {
                Box::pin(async move {
                    res.set_html("fallback handled it");
                    Ok(Outcome::Continue)
                })
            })),
            0,
        )
        .unwrap();

        let mut req = mk_request("/anything/here");
        let mut res = Response::new(None);
        handle(&host, &mut req, &mut res).await;

        assert_eq!(res.code, 200);
    }

    #[tokio::test]
    async fn request_and_response_buses_run_around_the_route() {
        let host = PluginHost::new();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

        let s1 = seen.clone();
        host.on(
            "request",
            Action::Callable(listener(move |_, _, _| {
                let s1 = s1.clone();
                Box::pin(async move {
                    s1.lock().unwrap().push("request");
                    Ok(Outcome::Continue)
                })
            })),
            0,
        )
        .unwrap();

        let s2 = seen.clone();
        host.on(
            "GET /ping",
            Action::Callable(listener(move |_, res, _| {
                let s2 = s2.clone();
                Box::pin(async move {
                    s2.lock().unwrap().push("route");
                    res.set_html("pong");
                    Ok(Outcome::Continue)
                })
            })),
            0,
        )
        .unwrap();

        let s3 = seen.clone();
        host.on(
            "response",
            Action::Callable(listener(move |_, _, _| {
                let s3 = s3.clone();
                Box::pin(async move {
                    s3.lock().unwrap().push("response");
                    Ok(Outcome::Continue)
                })
            })),
            0,
        )
        .unwrap();

        let mut req = mk_request("/ping");
        let mut res = Response::new(None);
        handle(&host, &mut req, &mut res).await;

        assert_eq!(*seen.lock().unwrap(), vec!["request", "route", "response"]);
        assert_eq!(res.code, 200);
    }

    #[tokio::test]
    async fn stop_skips_dispatch_but_response_bus_still_fires() {
        let host = PluginHost::new();
        let response_ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

        host.on(
            "GET /stream",
            Action::Callable(listener(|_, res, _| {
                Box::pin(async move {
                    res.set_code(200);
                    res.stop();
                    Ok(Outcome::Continue)
                })
            })),
            0,
        )
        .unwrap();

        let flag = response_ran.clone();
        host.on(
            "response",
            Action::Callable(listener(move |_, _, _| {
                let flag = flag.clone();
                Box::pin(async move {
                    flag.store(true, std::sync::atomic::Ordering::SeqCst);
                    Ok(Outcome::Continue)
                })
            })),
            0,
        )
        .unwrap();

        let mut req = mk_request("/stream");
        let mut res = Response::new(None);
        handle(&host, &mut req, &mut res).await;

        assert!(response_ran.load(std::sync::atomic::Ordering::SeqCst));
        assert!(res.sent);
    }
}
