//! JsonStore: загрузка и асинхронное сохранение документа `ключ -> значение`.
//!
//! `load` синхронный. `save` сериализует документ сразу и пишет файл в
//! отдельной задаче; ошибка записи доходит до вызывающего только если он
//! дождётся возвращённого `SaveTask`, иначе она лишь логируется.
//! `drain` - ограниченное ожидание завершения всех записей перед выходом.

use crate::config::StoreConfig;
use crate::error::{Result, ShellError};
use crate::debug_if_enabled;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{error, warn};
use url::Url;

/// Документ, который читает и пишет хранилище
pub type JsonDocument = Map<String, Value>;

const FILE_SCHEME: &str = "file:";

/// Результат ожидания незавершённых записей
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Записей не осталось, потрачено `attempts` попыток
    Drained { attempts: u32 },
    /// Лимит попыток исчерпан, `pending` записей ещё выполняются
    TimedOut { pending: usize },
}

/// Фоновая запись файла. Можно дождаться результата или просто отбросить.
pub struct SaveTask {
    url: String,
    handle: JoinHandle<Result<()>>,
}

impl SaveTask {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Дождаться завершения записи
    pub async fn wait(self) -> Result<()> {
        self.handle
            .await
            .map_err(|e| ShellError::Internal(format!("задача записи {} прервана: {}", self.url, e)))?
    }
}

/// Счётчик незавершённых операций. Значение публикуется через watch-канал,
/// на котором ждёт `drain`.
struct PendingOps {
    count: watch::Sender<usize>,
}

impl PendingOps {
    fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self { count }
    }

    fn begin(self: &Arc<Self>) -> PendingGuard {
        self.count.send_modify(|c| *c += 1);
        PendingGuard { ops: Arc::clone(self) }
    }

    fn current(&self) -> usize {
        *self.count.borrow()
    }
}

/// Уменьшает счётчик при завершении (в том числе при панике или отмене задачи)
struct PendingGuard {
    ops: Arc<PendingOps>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.ops.count.send_modify(|c| *c = c.saturating_sub(1));
    }
}

#[derive(Clone)]
pub struct JsonStore {
    config: StoreConfig,
    pending: Arc<PendingOps>,
    failed_writes: Arc<AtomicU64>,
}

impl JsonStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            pending: Arc::new(PendingOps::new()),
            failed_writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Очистить `target`, прочитать `url` и влить в него разобранный объект.
    /// `target` остаётся пустым, если загрузка не удалась.
    pub fn load(&self, url: &str, target: &mut JsonDocument) -> Result<()> {
        target.clear();

        let path = resolve_path(url)?;
        let body = std::fs::read_to_string(&path).map_err(|e| {
            debug_if_enabled!("Чтение {} не удалось: {}", path.display(), e);
            ShellError::LoadFailure {
                status: status_for(e.kind()),
                url: url.to_string(),
            }
        })?;

        let parsed: JsonDocument = serde_json::from_str(&body)?;
        let keys = parsed.len();
        target.extend(parsed);

        debug_if_enabled!("Загружено {} ключей из {}", keys, url);
        Ok(())
    }

    /// Сериализовать `source` и записать в фоне. Возвращается до окончания записи.
    pub fn save(&self, url: &str, source: &JsonDocument) -> Result<SaveTask> {
        let path = resolve_path(url).map_err(|_| {
            ShellError::InvalidArgument(format!("неподдерживаемый адрес для записи: {}", url))
        })?;
        let text = to_pretty_json(source)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            ShellError::Internal(format!("сохранение {} вне async runtime: {}", url, e))
        })?;

        let guard = self.pending.begin();
        let failed_writes = Arc::clone(&self.failed_writes);
        let task_url = url.to_string();

        let handle = runtime.spawn(async move {
            let _guard = guard;
            let result = write_file(path, text).await;
            if let Err(e) = &result {
                failed_writes.fetch_add(1, Ordering::Relaxed);
                error!("Фоновая запись {} не удалась: {}", task_url, e);
            } else {
                debug_if_enabled!("Записан {}", task_url);
            }
            result
        });

        Ok(SaveTask {
            url: url.to_string(),
            handle,
        })
    }

    /// Дождаться окончания фоновых записей, но не дольше
    /// `drain_max_attempts` интервалов ожидания.
    pub async fn drain(&self) -> DrainOutcome {
        let mut rx = self.pending.count.subscribe();
        let interval = Duration::from_millis(self.config.drain_poll_interval_ms);
        let max_attempts = self.config.drain_max_attempts;

        for attempt in 1..=max_attempts {
            if *rx.borrow_and_update() == 0 {
                debug_if_enabled!("Очередь записи пуста после {} попыток", attempt);
                return DrainOutcome::Drained { attempts: attempt };
            }
            // Ошибка означает закрытый канал - проверим счётчик на следующей итерации
            let _ = timeout(interval, rx.changed()).await;
        }

        let pending = self.pending.current();
        if pending == 0 {
            return DrainOutcome::Drained { attempts: max_attempts };
        }

        warn!(
            "Не дождались {} фоновых записей за {} попыток",
            pending, max_attempts
        );
        DrainOutcome::TimedOut { pending }
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.current()
    }

    /// Сколько фоновых записей завершилось ошибкой
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// `file:///path` (с %-кодированием и хостом `localhost`) или обычный путь
pub fn resolve_path(url: &str) -> Result<PathBuf> {
    let bad_url = || ShellError::LoadFailure { status: 400, url: url.to_string() };

    if url.starts_with(FILE_SCHEME) {
        let parsed = Url::parse(url).map_err(|_| bad_url())?;
        // Путь, оканчивающийся на `/`, указывает на каталог, а не на документ
        if parsed.path().ends_with('/') {
            return Err(bad_url());
        }
        return parsed.to_file_path().map_err(|_| bad_url());
    }

    if url.is_empty() || url.contains("://") {
        return Err(bad_url());
    }

    Ok(PathBuf::from(url))
}

/// JSON с отступом в 4 пробела, порядок ключей как при построении
pub fn to_pretty_json(source: &JsonDocument) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    source.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| ShellError::Internal(format!("JSON не в UTF-8: {}", e)))
}

async fn write_file(path: PathBuf, text: String) -> Result<()> {
    let mut file = tokio::fs::File::create(&path).await?;
    file.write_all(text.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::NotFound => 404,
        ErrorKind::PermissionDenied => 403,
        _ => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> JsonStore {
        JsonStore::new(StoreConfig::default())
    }

    fn document(value: Value) -> JsonDocument {
        match value {
            Value::Object(map) => map,
            other => panic!("ожидался объект, получено {}", other),
        }
    }

    #[tokio::test]
    async fn test_round_trip_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().join("state.json").display());
        let store = store();

        store
            .save(&url, &document(json!({"a": 1, "b": "x"})))
            .unwrap()
            .wait()
            .await
            .unwrap();

        let mut target = document(json!({"stale": true, "a": 99}));
        store.load(&url, &mut target).unwrap();

        assert_eq!(Value::Object(target), json!({"a": 1, "b": "x"}));
    }

    #[tokio::test]
    async fn test_save_captures_document_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let url = path.display().to_string();
        let store = store();

        let mut source = document(json!({"count": 1}));
        let task = store.save(&url, &source).unwrap();
        source.insert("count".to_string(), json!(2));
        task.wait().await.unwrap();

        let mut target = JsonDocument::new();
        store.load(&url, &mut target).unwrap();
        assert_eq!(target.get("count"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_saved_text_keeps_order_and_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = store();

        let mut source = JsonDocument::new();
        source.insert("zeta".to_string(), json!(1));
        source.insert("alpha".to_string(), json!({"inner": true}));
        store.save(&path.display().to_string(), &source).unwrap().wait().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "{\n    \"zeta\": 1,\n    \"alpha\": {\n        \"inner\": true\n    }\n}"
        );
    }

    #[test]
    fn test_load_missing_file_reports_status_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().join("missing.json").display());
        let mut target = document(json!({"keep": "me"}));

        let err = store().load(&url, &mut target).unwrap_err();
        match err {
            ShellError::LoadFailure { status, url: failed } => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("неожиданная ошибка: {}", other),
        }
        assert!(target.is_empty());
    }

    #[test]
    fn test_load_rejects_unsupported_scheme() {
        let mut target = JsonDocument::new();
        let err = store().load("https://example.com/state.json", &mut target).unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_load_invalid_json_is_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut target = JsonDocument::new();
        let err = store().load(&path.display().to_string(), &mut target).unwrap_err();
        assert!(matches!(err, ShellError::Parse(_)));

        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let err = store().load(&path.display().to_string(), &mut target).unwrap_err();
        assert!(matches!(err, ShellError::Parse(_)));
    }

    #[tokio::test]
    async fn test_background_failure_is_observable_only_through_task() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("no/such/dir/state.json").display().to_string();
        let store = store();

        let task = store.save(&url, &document(json!({"a": 1}))).unwrap();
        assert!(matches!(task.wait().await, Err(ShellError::Io(_))));
        assert_eq!(store.failed_writes(), 1);

        // Вызывающий, отбросивший задачу, узнаёт об ошибке только по счётчику
        drop(store.save(&url, &document(json!({"a": 2}))).unwrap());
        assert!(matches!(store.drain().await, DrainOutcome::Drained { .. }));
        assert_eq!(store.failed_writes(), 2);
    }

    #[tokio::test]
    async fn test_drain_waits_for_fire_and_forget_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();

        for n in 0..5 {
            let url = dir.path().join(format!("state-{}.json", n)).display().to_string();
            drop(store.save(&url, &document(json!({"n": n}))).unwrap());
        }

        let outcome = store.drain().await;
        assert!(matches!(outcome, DrainOutcome::Drained { .. }));
        assert_eq!(store.pending_writes(), 0);

        for n in 0..5 {
            let mut target = JsonDocument::new();
            let url = dir.path().join(format!("state-{}.json", n)).display().to_string();
            store.load(&url, &mut target).unwrap();
            assert_eq!(target.get("n"), Some(&json!(n)));
        }
    }

    #[tokio::test]
    async fn test_drain_with_nothing_pending_returns_immediately() {
        let outcome = store().drain().await;
        assert_eq!(outcome, DrainOutcome::Drained { attempts: 1 });
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_max_attempts() {
        let store = JsonStore::new(StoreConfig {
            drain_max_attempts: 3,
            drain_poll_interval_ms: 1,
            ..StoreConfig::default()
        });

        // Незавершённая операция, которая не закончится во время ожидания
        let guard = store.pending.begin();
        assert_eq!(store.drain().await, DrainOutcome::TimedOut { pending: 1 });

        drop(guard);
        assert_eq!(store.drain().await, DrainOutcome::Drained { attempts: 1 });
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("file:///tmp/a.json").unwrap(), PathBuf::from("/tmp/a.json"));
        assert_eq!(resolve_path("state.json").unwrap(), PathBuf::from("state.json"));
        assert!(resolve_path("file://").is_err());
        assert!(resolve_path("").is_err());
    }

    #[test]
    fn test_resolve_path_decodes_file_url() {
        assert_eq!(
            resolve_path("file:///tmp/my%20state.json").unwrap(),
            PathBuf::from("/tmp/my state.json")
        );
        assert_eq!(
            resolve_path("file://localhost/tmp/a.json").unwrap(),
            PathBuf::from("/tmp/a.json")
        );
        assert_eq!(resolve_path("file://remote-host/tmp/a.json").unwrap_err().status(), Some(400));
    }

    #[tokio::test]
    async fn test_round_trip_with_encoded_space() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my state.json");
        let url = format!("file://{}/my%20state.json", dir.path().display());
        let store = store();

        store.save(&url, &document(json!({"a": 1}))).unwrap().wait().await.unwrap();
        assert!(path.exists());

        let mut target = JsonDocument::new();
        store.load(&url, &mut target).unwrap();
        assert_eq!(target.get("a"), Some(&json!(1)));
    }
}
