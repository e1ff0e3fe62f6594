//! DebounceScheduler: схлопывание серий вызовов в один отложенный вызов.
//!
//! На каждый идентификатор приходится не больше одного ожидающего таймера.
//! Повторный вызов с тем же идентификатором отменяет прежний таймер; вызов
//! с `cancel = true` только отменяет и ничего не планирует.

use crate::error::{Result, ShellError};
use crate::debug_if_enabled;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Идентификатор слота debounce
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebounceKey(String);

impl DebounceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Идентификатор по имени типа функции. Два значения одной и той же
    /// функции попадают в один слот.
    pub fn of<F>(_callback: &F) -> Self {
        Self(std::any::type_name::<F>().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DebounceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for DebounceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for DebounceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ожидающий отложенный вызов
#[derive(Debug)]
struct PendingTimer {
    handle: JoinHandle<()>,
    generation: u64,
}

pub struct DebounceScheduler {
    pending: Arc<DashMap<DebounceKey, PendingTimer>>,
    generation: AtomicU64,
}

impl Default for DebounceScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl DebounceScheduler {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Отложить вызов `callback` на `delay_ms` миллисекунд под ключом `key`.
    /// Ожидающий вызов с тем же ключом отменяется всегда; при `cancel = true`
    /// новый не планируется.
    pub fn debounce<F>(
        &self,
        key: impl Into<DebounceKey>,
        delay_ms: f64,
        cancel: bool,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.debounce_opt(key, delay_ms, cancel, Some(callback))
    }

    /// Вариант с необязательным обработчиком: `None` - некорректный вызов
    pub fn debounce_opt<F>(
        &self,
        key: impl Into<DebounceKey>,
        delay_ms: f64,
        cancel: bool,
        callback: Option<F>,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let key = key.into();
        let Some(callback) = callback else {
            return ShellError::invalid_argument(format!("debounce '{}': не задан обработчик", key));
        };
        let delay = validate_delay(&key, delay_ms)?;

        if key.as_str().is_empty() {
            return ShellError::invalid_argument("debounce: пустой ключ");
        }

        if cancel {
            self.cancel(&key);
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|e| {
            ShellError::InvalidArgument(format!("debounce '{}' вызван вне async runtime: {}", key, e))
        })?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        // Запись держит блокировку шарда: отмена и перепланирование атомарны для ключа
        match self.pending.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                occupied.get().handle.abort();
                debug_if_enabled!("debounce '{}': прежний таймер отменён", key);
                let handle = self.spawn_timer(&runtime, key.clone(), generation, delay, callback);
                occupied.insert(PendingTimer { handle, generation });
            }
            Entry::Vacant(vacant) => {
                let handle = self.spawn_timer(&runtime, key.clone(), generation, delay, callback);
                vacant.insert(PendingTimer { handle, generation });
            }
        }

        debug_if_enabled!("debounce '{}': вызов через {}мс", key, delay.as_millis());
        Ok(())
    }

    /// Ключ выводится из имени типа функции. Функции с одинаковым
    /// именем делят один слот.
    pub fn debounce_named<F>(&self, callback: F, delay_ms: f64, cancel: bool) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let key = DebounceKey::of(&callback);
        self.debounce(key, delay_ms, cancel, callback)
    }

    /// Отменить ожидающий вызов. `true`, если было что отменять.
    pub fn cancel(&self, key: &DebounceKey) -> bool {
        match self.pending.remove(key) {
            Some((_, timer)) => {
                timer.handle.abort();
                debug_if_enabled!("debounce '{}': ожидающий вызов отменён", key);
                true
            }
            None => false,
        }
    }

    /// Отменить все ожидающие вызовы
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<DebounceKey> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        let cancelled = keys.iter().filter(|key| self.cancel(key)).count();
        if cancelled > 0 {
            info!("Отменено {} ожидающих debounce-вызовов", cancelled);
        }
        cancelled
    }

    pub fn is_pending(&self, key: &DebounceKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn spawn_timer<F>(
        &self,
        runtime: &Handle,
        key: DebounceKey,
        generation: u64,
        delay: Duration,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let pending = Arc::clone(&self.pending);
        runtime.spawn(async move {
            sleep(delay).await;

            // Таймер, проигравший гонку новому вызову, не срабатывает
            let still_current = pending
                .remove_if(&key, |_, timer| timer.generation == generation)
                .is_some();
            if still_current {
                debug_if_enabled!("debounce '{}': вызов", key);
                callback();
            }
        })
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.value().handle.abort();
        }
    }
}

fn validate_delay(key: &DebounceKey, delay_ms: f64) -> Result<Duration> {
    if !delay_ms.is_finite() || delay_ms < 0.0 {
        return ShellError::invalid_argument(format!(
            "debounce '{}': некорректная задержка {}",
            key, delay_ms
        ));
    }
    Duration::try_from_secs_f64(delay_ms / 1000.0).map_err(|e| {
        ShellError::InvalidArgument(format!("debounce '{}': задержка {} вне диапазона: {}", key, delay_ms, e))
    })
}
