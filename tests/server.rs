//! The hyper host: requests whose client hangs up, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use strata::{
    BoxFuture, Fault, Filter, Layer, Method, Next, Registry, Request, Response, Route, Router, Server,
    Terminable,
};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn entries(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

/// Holds the request for `delay` before delegating; records entry, exit and
/// termination, taking `flush` to terminate.
struct Slow {
    delay: Duration,
    flush: Duration,
    log: Log,
}

impl Filter for Slow {
    fn handle<'a>(&'a self, req: &'a mut Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Fault>> {
        Box::pin(async move {
            self.log.lock().unwrap().push("enter");
            tokio::time::sleep(self.delay).await;
            let res = next.run(req).await?;
            self.log.lock().unwrap().push("exit");
            Ok(res)
        })
    }

    fn name(&self) -> &str { "slow" }
}

impl Terminable for Slow {
    fn terminate<'a>(&'a self, _req: &'a Request, _res: &'a Response) -> BoxFuture<'a, Result<(), Fault>> {
        Box::pin(async move {
            tokio::time::sleep(self.flush).await;
            self.log.lock().unwrap().push("terminate");
            Ok(())
        })
    }
}

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    server: JoinHandle<Result<(), strata::Error>>,
}

async fn start(slow: Slow) -> Running {
    let registry = Registry::builder()
        .register_keyed("slow", Layer::terminable(slow))
        .unwrap()
        .build();
    let app = Router::new()
        .route(Route::new(Method::GET, "/slow", |_req: Request| async { "done" }).with(["slow"]))
        .compile(&registry)
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(Server::serve_on(listener, app, async {
        let _ = stopped.await;
    }));

    Running { addr, stop, server }
}

async fn wait_for(log: &Log, entry: &str) {
    for _ in 0..40 {
        if entries(log).contains(&entry) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn client_hangup_mid_chain_still_terminates_entered_filters() {
    let log = Log::default();
    let running = start(Slow {
        delay: Duration::from_millis(300),
        flush: Duration::ZERO,
        log: Arc::clone(&log),
    })
    .await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    stream.write_all(b"GET /slow HTTP/1.1\r\nhost: localhost\r\n\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(stream);

    wait_for(&log, "terminate").await;
    assert_eq!(entries(&log), ["enter", "exit", "terminate"]);

    running.stop.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn graceful_shutdown_waits_for_termination() {
    let log = Log::default();
    let running = start(Slow {
        delay: Duration::ZERO,
        flush: Duration::from_millis(200),
        log: Arc::clone(&log),
    })
    .await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    stream
        .write_all(b"GET /slow HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();
    assert!(raw.starts_with("HTTP/1.1 200"), "{raw}");
    assert!(raw.ends_with("done"), "{raw}");

    // The response is out but the hook is still flushing.
    assert_eq!(entries(&log), ["enter", "exit"]);

    running.stop.send(()).unwrap();
    running.server.await.unwrap().unwrap();

    assert_eq!(entries(&log), ["enter", "exit", "terminate"]);
}
