//! In-process stand-in for the Jira REST API.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use url::form_urlencoded;

use super::error::TransportError;
use super::transport::{Method, Transport};
use super::types::Credentials;

#[derive(Default)]
struct FakeState {
  display_name: String,
  tasks: Vec<Value>,
  worklogs: BTreeMap<String, Vec<Value>>,
  page_cap: Option<usize>,
  next_id: u64,
}

/// Fake Jira that serves users, assigned issues and worklogs from memory and
/// records every call it receives.
pub struct FakeJira {
  state: Mutex<FakeState>,
  calls: Mutex<Vec<(Method, String)>>,
  bodies: Mutex<Vec<Value>>,
  failing: AtomicBool,
  blank_writes: AtomicBool,
}

impl FakeJira {
  /// Fake whose user search resolves to `display_name`.
  pub fn new(display_name: &str) -> Self {
    Self {
      state: Mutex::new(FakeState {
        display_name: display_name.to_string(),
        next_id: 1000,
        ..Default::default()
      }),
      calls: Mutex::new(Vec::new()),
      bodies: Mutex::new(Vec::new()),
      failing: AtomicBool::new(false),
      blank_writes: AtomicBool::new(false),
    }
  }

  pub fn with_task(self, key: &str, summary: &str) -> Self {
    {
      let mut state = self.state.lock().unwrap();
      let id = 10_000 + state.tasks.len();
      state.tasks.push(json!({
        "id": id.to_string(),
        "key": key,
        "fields": {
          "summary": summary,
          "status": { "name": "In Progress" },
          "updated": "2024-06-01T08:00:00.000+0000"
        }
      }));
      state.worklogs.entry(key.to_string()).or_default();
    }
    self
  }

  pub fn with_worklog(self, task_key: &str, author: &str, time_spent: &str, updated: &str) -> Self {
    self.push_worklog(task_key, author, time_spent, updated);
    self
  }

  /// Serve at most `cap` items per page regardless of `maxResults`.
  pub fn with_page_cap(self, cap: usize) -> Self {
    self.state.lock().unwrap().page_cap = Some(cap);
    self
  }

  /// Add a worklog behind the client's back.
  pub fn push_worklog(&self, task_key: &str, author: &str, time_spent: &str, updated: &str) {
    let mut state = self.state.lock().unwrap();
    state.next_id += 1;
    let worklog = json!({
      "id": state.next_id.to_string(),
      "author": { "displayName": author },
      "timeSpent": time_spent,
      "comment": "",
      "updated": updated
    });
    state
      .worklogs
      .entry(task_key.to_string())
      .or_default()
      .push(worklog);
  }

  /// Make every following call fail with HTTP 503.
  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  /// Store POSTed worklogs but answer with an empty body.
  pub fn set_blank_writes(&self, blank: bool) {
    self.blank_writes.store(blank, Ordering::SeqCst);
  }

  /// Number of calls with this method and path (query string ignored).
  pub fn calls(&self, method: Method, path: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|(m, endpoint)| *m == method && split_endpoint(endpoint).0 == path)
      .count()
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  /// Bodies of every call that carried one.
  pub fn bodies(&self) -> Vec<Value> {
    self.bodies.lock().unwrap().clone()
  }

  fn page(&self, items: &[Value], query: &BTreeMap<String, String>) -> (Vec<Value>, usize) {
    let cap = self.state.lock().unwrap().page_cap;
    let start: usize = query
      .get("startAt")
      .and_then(|s| s.parse().ok())
      .unwrap_or(0);
    let mut size: usize = query
      .get("maxResults")
      .and_then(|s| s.parse().ok())
      .unwrap_or(50);
    if let Some(cap) = cap {
      size = size.min(cap);
    }
    let page = items.iter().skip(start).take(size).cloned().collect();
    (page, items.len())
  }
}

fn split_endpoint(endpoint: &str) -> (&str, &str) {
  endpoint.split_once('?').unwrap_or((endpoint, ""))
}

fn status(method: Method, endpoint: &str, status: u16) -> TransportError {
  TransportError::Status {
    method,
    endpoint: endpoint.to_string(),
    status,
    body: String::new(),
  }
}

#[async_trait]
impl Transport for FakeJira {
  async fn call(
    &self,
    credentials: &Credentials,
    endpoint: &str,
    method: Method,
    body: Option<&Value>,
  ) -> Result<Value, TransportError> {
    self
      .calls
      .lock()
      .unwrap()
      .push((method, endpoint.to_string()));
    if let Some(body) = body {
      self.bodies.lock().unwrap().push(body.clone());
    }

    if self.failing.load(Ordering::SeqCst) {
      return Err(status(method, endpoint, 503));
    }

    let (path, query) = split_endpoint(endpoint);
    let query: BTreeMap<String, String> = form_urlencoded::parse(query.as_bytes())
      .into_owned()
      .collect();
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
      (Method::Get, ["user", "search"]) => {
        let display_name = self.state.lock().unwrap().display_name.clone();
        Ok(json!([{
          "accountId": "acc-1",
          "displayName": display_name,
          "emailAddress": credentials.email,
        }]))
      }
      (Method::Get, ["search"]) => {
        let tasks = self.state.lock().unwrap().tasks.clone();
        let (issues, total) = self.page(&tasks, &query);
        Ok(json!({ "issues": issues, "total": total }))
      }
      (Method::Get, ["issue", key, "worklog"]) => {
        let worklogs = self.state.lock().unwrap().worklogs.get(*key).cloned();
        let worklogs = worklogs.ok_or_else(|| status(method, endpoint, 404))?;
        let (page, total) = self.page(&worklogs, &query);
        Ok(json!({ "worklogs": page, "total": total }))
      }
      (Method::Post, ["issue", key, "worklog"]) => {
        let body = body.ok_or_else(|| status(method, endpoint, 400))?;
        let mut state = self.state.lock().unwrap();
        if !state.worklogs.contains_key(*key) {
          return Err(status(method, endpoint, 404));
        }
        state.next_id += 1;
        let created = json!({
          "id": state.next_id.to_string(),
          "issueId": "10000",
          "author": { "displayName": state.display_name },
          "timeSpent": body["timeSpent"],
          "comment": body["comment"],
          "updated": body.get("started").cloned().unwrap_or(json!("2024-06-10T12:00:00.000+0000"))
        });
        state
          .worklogs
          .entry(key.to_string())
          .or_default()
          .push(created.clone());
        if self.blank_writes.load(Ordering::SeqCst) {
          return Ok(Value::Null);
        }
        Ok(created)
      }
      _ => Err(status(method, endpoint, 404)),
    }
  }
}
