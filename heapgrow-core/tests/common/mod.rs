//! Scripted in-process stand-in for a Tile38 server
//!
//! Speaks just enough RESP for the harness: SET, SETHOOK/SETCHAN, AOFSHRINK,
//! SERVER [EXT], SUBSCRIBE and PDELHOOK/PDELCHAN, answering each the way
//! Tile38 does in RESP mode (`+OK` for SET and AOFSHRINK, integers for hook
//! registration and deletion). Every command received is recorded so tests
//! can assert on what went over the wire.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use heapgrow_core::config::HeapgrowConfig;
use heapgrow_core::resp::{RespCodec, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

#[derive(Debug, Clone)]
pub struct Behavior {
    /// Answer SETHOOK/SETCHAN with an error reply
    pub reject_hooks: bool,
    /// `message` pushes sent after each SUBSCRIBE
    pub pushes_per_subscribe: usize,
    /// Reported heap before any objects are stored
    pub base_heap: u64,
    /// Once this many SETs have been answered, close the connection carrying
    /// the next one without replying (a single time)
    pub drop_after_sets: Option<u64>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            reject_hooks: false,
            pushes_per_subscribe: 0,
            base_heap: 1 << 30,
            drop_after_sets: None,
        }
    }
}

#[derive(Default)]
struct State {
    behavior: Behavior,
    log: Mutex<Vec<Vec<String>>>,
    objects: AtomicU64,
    hooks: Mutex<BTreeSet<String>>,
    dropped: AtomicBool,
}

impl State {
    fn should_drop(&self, args: &[String]) -> bool {
        let Some(limit) = self.behavior.drop_after_sets else {
            return false;
        };
        args[0].eq_ignore_ascii_case("SET")
            && self.objects.load(Ordering::Relaxed) >= limit
            && !self.dropped.swap(true, Ordering::Relaxed)
    }
}

pub struct FakeTile38 {
    addr: String,
    state: Arc<State>,
}

impl FakeTile38 {
    pub async fn start() -> Self {
        Self::start_with(Behavior::default()).await
    }

    pub async fn start_with(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let state = Arc::new(State { behavior, ..State::default() });

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept_state)));
            }
        });
        Self { addr, state }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Every received command named `name`, as argument strings
    pub fn commands(&self, name: &str) -> Vec<Vec<String>> {
        let log = self.state.log.lock().unwrap();
        log.iter().filter(|args| args[0].eq_ignore_ascii_case(name)).cloned().collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.commands(name).len()
    }

    /// Hooks or channels currently registered
    pub fn hooks(&self) -> Vec<String> {
        self.state.hooks.lock().unwrap().iter().cloned().collect()
    }
}

async fn serve(stream: TcpStream, state: Arc<State>) {
    let mut framed = Framed::new(stream, RespCodec);
    while let Some(Ok(frame)) = framed.next().await {
        let Some(args) = to_args(frame) else {
            return;
        };
        state.log.lock().unwrap().push(args.clone());
        if state.should_drop(&args) {
            return;
        }

        for reply in respond(&state, &args) {
            if framed.feed(reply).await.is_err() {
                return;
            }
        }
        if SinkExt::<Value>::flush(&mut framed).await.is_err() {
            return;
        }
    }
}

fn to_args(frame: Value) -> Option<Vec<String>> {
    match frame {
        Value::Array(Some(items)) if !items.is_empty() => {
            items.iter().map(Value::as_text).collect()
        }
        _ => None,
    }
}

fn pairs(items: &[(&str, String)]) -> Value {
    let mut flat = Vec::with_capacity(items.len() * 2);
    for (k, v) in items {
        flat.push(Value::bulk(k.to_string()));
        flat.push(Value::bulk(v.clone()));
    }
    Value::Array(Some(flat))
}

fn respond(state: &State, args: &[String]) -> Vec<Value> {
    let ok = || Value::Simple("OK".into());
    match args[0].to_ascii_uppercase().as_str() {
        "SET" => {
            state.objects.fetch_add(1, Ordering::Relaxed);
            vec![ok()]
        }
        "SETHOOK" | "SETCHAN" => {
            if state.behavior.reject_hooks {
                vec![Value::Error("ERR hooks disabled".into())]
            } else {
                let created = state.hooks.lock().unwrap().insert(args[1].clone());
                vec![Value::Integer(created as i64)]
            }
        }
        "AOFSHRINK" => vec![ok()],
        "SERVER" if args.get(1).is_some_and(|a| a.eq_ignore_ascii_case("EXT")) => vec![pairs(&[
            ("tile38_num_hook_groups", state.hooks.lock().unwrap().len().to_string()),
            ("tile38_num_object_groups", "1".to_string()),
            ("go_goroutines", "12".to_string()),
        ])],
        "SERVER" => {
            let objects = state.objects.load(Ordering::Relaxed);
            vec![pairs(&[
                ("heap_size", (state.behavior.base_heap + objects * 128).to_string()),
                ("num_objects", objects.to_string()),
                ("id", "fake".to_string()),
            ])]
        }
        "SUBSCRIBE" => {
            let channels = &args[1..];
            let mut replies: Vec<Value> = channels
                .iter()
                .enumerate()
                .map(|(i, ch)| {
                    Value::Array(Some(vec![
                        Value::bulk("subscribe"),
                        Value::bulk(ch.clone()),
                        Value::Integer(i as i64 + 1),
                    ]))
                })
                .collect();
            for n in 0..state.behavior.pushes_per_subscribe {
                replies.push(Value::Array(Some(vec![
                    Value::bulk("message"),
                    Value::bulk(channels[n % channels.len()].clone()),
                    Value::bulk("{\"command\":\"set\",\"detect\":\"enter\"}"),
                ])));
            }
            replies
        }
        "PDELHOOK" | "PDELCHAN" => {
            let prefix = args[1].trim_end_matches('*');
            let mut hooks = state.hooks.lock().unwrap();
            let before = hooks.len();
            hooks.retain(|name| !name.starts_with(prefix));
            vec![Value::Integer((before - hooks.len()) as i64)]
        }
        _ => vec![Value::Error(format!("ERR unknown command '{}'", args[0]))],
    }
}

/// An address nothing is listening on
pub fn unused_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Fast timers, no hooks, short grace; tests switch on what they exercise
pub fn test_config(addr: &str) -> HeapgrowConfig {
    let mut config = HeapgrowConfig::default();
    config.server.addr = addr.to_string();
    config.server.connect_timeout_ms = 500;
    config.hooks.count = 0;
    config.monitor.poll_interval_ms = 20;
    config.monitor.summary_interval_ms = 100;
    config.monitor.compaction_interval_ms = 50;
    config.monitor.shutdown_grace_ms = 500;
    config.workload.reconnect_backoff_ms = 10;
    config.workload.max_backoff_ms = 40;
    config
}
