//! ShellApp: связывает горячие клавиши, debounce и хранилище для одного окна.

use crate::config::{Config, ShortcutAction, ShortcutMapping};
use crate::error::Result;
use crate::events::KeyEvent;
use crate::services::{
    key_event_label, DebounceKey, DebounceScheduler, DispatchOutcome, DrainOutcome, Element,
    EventTarget, JsonDocument, JsonStore, ShortcutHandler, ShortcutRegistry, ShortcutSpec,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

const SAVE_KEY: &str = "save-state";

pub struct ShellApp {
    config: Arc<Config>,
    element: Arc<Element>,
    registry: ShortcutRegistry,
    scheduler: Arc<DebounceScheduler>,
    store: JsonStore,
    state: Arc<Mutex<JsonDocument>>,
}

impl ShellApp {
    pub fn new(config: Arc<Config>) -> Self {
        info!("Инициализация ShellApp");

        let store = JsonStore::new(config.store.clone());

        Self {
            config,
            element: Arc::new(Element::new("main-window")),
            registry: ShortcutRegistry::new(),
            scheduler: Arc::new(DebounceScheduler::new()),
            store,
            state: Arc::new(Mutex::new(JsonDocument::new())),
        }
    }

    /// Загрузить состояние. Отсутствующий файл - пустое состояние, не ошибка.
    pub fn load_state(&self) -> Result<()> {
        let mut state = self.state.lock();
        match self.store.load(&self.config.store.state_url, &mut state) {
            Ok(()) => {
                info!("Состояние загружено: {} ключей", state.len());
                Ok(())
            }
            Err(e) if e.status() == Some(404) => {
                info!("Файл состояния {} не найден, начинаем с пустого", self.config.store.state_url);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Зарегистрировать все горячие клавиши из конфигурации
    pub fn install_shortcuts(&self) -> Result<usize> {
        let mut installed = 0;
        for mapping in &self.config.shortcuts {
            let spec = ShortcutSpec::from_modifiers(mapping.code()?, mapping.modifiers());
            let handler = self.handler_for(mapping);
            if self.registry.register(Some(self.element.as_ref()), Some(spec), Some(handler)) {
                installed += 1;
            }
        }

        info!("Установлено {} горячих клавиш", installed);
        Ok(installed)
    }

    fn handler_for(&self, mapping: &ShortcutMapping) -> ShortcutHandler {
        let action = mapping.action;
        let scheduler = Arc::clone(&self.scheduler);
        let store = self.store.clone();
        let state = Arc::clone(&self.state);
        let url = self.config.store.state_url.clone();
        let delay_ms = self.config.debounce.default_delay_ms as f64;

        Arc::new(move |event: &KeyEvent| {
            match action {
                ShortcutAction::Save => {
                    let store = store.clone();
                    let state = Arc::clone(&state);
                    let url = url.clone();
                    let scheduled = scheduler.debounce(SAVE_KEY, delay_ms, false, move || {
                        let snapshot = state.lock().clone();
                        if let Err(e) = store.save(&url, &snapshot) {
                            error!("Не удалось начать сохранение {}: {}", url, e);
                        }
                    });
                    if let Err(e) = scheduled {
                        error!("Не удалось запланировать сохранение: {}", e);
                    }
                }
                ShortcutAction::CancelSave => {
                    if scheduler.cancel(&DebounceKey::new(SAVE_KEY)) {
                        info!("Ожидающее сохранение отменено");
                    }
                }
                ShortcutAction::Reload => {
                    let mut state = state.lock();
                    match store.load(&url, &mut state) {
                        Ok(()) => info!("Состояние перечитано: {} ключей", state.len()),
                        Err(e) => warn!("Не удалось перечитать состояние: {}", e),
                    }
                }
                ShortcutAction::Log => {
                    info!("Горячая клавиша: {}", key_event_label(event));
                }
            }
            Some(true)
        })
    }

    /// Доставить событие окну
    pub fn dispatch(&self, event: &KeyEvent) -> DispatchOutcome {
        let outcome = self.element.dispatch(event);
        crate::debug_if_enabled!(
            "Событие {}: доставлено {} слушателям, результат {:?}",
            key_event_label(event),
            outcome.notified,
            outcome.result
        );
        outcome
    }

    /// Записать значение в состояние (применяется приложением между сохранениями)
    pub fn set_value(&self, key: impl Into<String>, value: serde_json::Value) {
        self.state.lock().insert(key.into(), value);
    }

    pub fn state_snapshot(&self) -> JsonDocument {
        self.state.lock().clone()
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn registry(&self) -> &ShortcutRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &DebounceScheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    /// Остановка: отложенное сохранение выполняется сразу, затем ждём очередь записи
    pub async fn shutdown(&self) -> DrainOutcome {
        let save_key = DebounceKey::new(SAVE_KEY);
        if self.scheduler.cancel(&save_key) {
            info!("Ожидающее сохранение выполняется немедленно перед выходом");
            let snapshot = self.state.lock().clone();
            if let Err(e) = self.store.save(&self.config.store.state_url, &snapshot) {
                error!("Не удалось сохранить состояние перед выходом: {}", e);
            }
        }
        self.scheduler.cancel_all();

        let outcome = self.store.drain().await;
        match outcome {
            DrainOutcome::Drained { attempts } => info!("Очередь записи пуста (попыток: {})", attempts),
            DrainOutcome::TimedOut { pending } => warn!("Выход с {} незавершёнными записями", pending),
        }
        outcome
    }
}
