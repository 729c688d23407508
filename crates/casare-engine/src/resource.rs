use async_trait::async_trait;

/// A resource an `ExecutionContext` owns on behalf of node plugins — a
/// browser process, a DB connection, an HTTP client pool (§3
/// ExecutionContext). The context is the sole owner; `close` is called
/// exactly once, on every exit path (success, error, cancel), never by the
/// node plugin itself.
#[async_trait]
pub trait ManagedResource: Send + Sync {
  async fn close(&mut self) -> Result<(), String>;
}

#[cfg(test)]
pub(crate) struct FakeResource {
  pub closed: bool,
  pub fail: bool,
}

#[cfg(test)]
#[async_trait]
impl ManagedResource for FakeResource {
  async fn close(&mut self) -> Result<(), String> {
    self.closed = true;
    if self.fail {
      Err("boom".to_string())
    } else {
      Ok(())
    }
  }
}
