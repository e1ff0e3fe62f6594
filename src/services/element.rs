//! Element: узел интерфейса, на который подписываются слушатели клавиатуры.
//!
//! `EventTarget` повторяет API подписки хоста (`element.on(event, handler)`),
//! `Element` - его реализация в процессе, используемая приложением и тестами.

use crate::debug_if_enabled;
use crate::events::{EventClass, KeyEvent};
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Слушатель события. `Some(value)` возвращается диспетчеру хоста,
/// `None` оставляет обработку по умолчанию.
pub type Listener = Arc<dyn Fn(&KeyEvent) -> Option<bool> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Итог доставки одного события
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Сколько слушателей класса получили событие. Слушатель горячей клавиши,
    /// чья комбинация не совпала, тоже учитывается; сработавший обработчик
    /// виден только по `result`.
    pub notified: usize,
    /// Значение для диспетчера: `Some(true)` от любого слушателя побеждает,
    /// иначе последнее определённое значение
    pub result: Option<bool>,
}

impl DispatchOutcome {
    /// Событие поглощено и дальше не распространяется
    pub fn consumed(&self) -> bool {
        self.result == Some(true)
    }
}

pub trait EventTarget: Send + Sync {
    fn name(&self) -> &str;

    /// Подписать слушателя на класс событий
    fn on(&self, class: EventClass, listener: Listener) -> ListenerId;

    /// Доставить событие всем слушателям его класса в порядке подписки
    fn dispatch(&self, event: &KeyEvent) -> DispatchOutcome;

    fn listener_count(&self, class: EventClass) -> usize;
}

struct Subscription {
    id: ListenerId,
    class: EventClass,
    listener: Listener,
}

pub struct Element {
    name: String,
    next_id: AtomicU64,
    listeners: RwLock<SmallVec<[Subscription; 4]>>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(SmallVec::new()),
        }
    }
}

impl EventTarget for Element {
    fn name(&self) -> &str {
        &self.name
    }

    fn on(&self, class: EventClass, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(Subscription { id, class, listener });
        debug_if_enabled!("Элемент '{}': подписка #{} на {}", self.name, id.0, class);
        id
    }

    fn dispatch(&self, event: &KeyEvent) -> DispatchOutcome {
        // Снимок под блокировкой: слушатель может подписать новых слушателей
        let snapshot: SmallVec<[(ListenerId, Listener); 4]> = self
            .listeners
            .read()
            .iter()
            .filter(|s| s.class == event.kind)
            .map(|s| (s.id, Arc::clone(&s.listener)))
            .collect();

        let mut outcome = DispatchOutcome::default();
        for (id, listener) in snapshot {
            outcome.notified += 1;
            let value = listener(event);
            debug_if_enabled!("Элемент '{}': слушатель #{} вернул {:?}", self.name, id.0, value);
            outcome.result = match (outcome.result, value) {
                (Some(true), _) => Some(true),
                (_, Some(v)) => Some(v),
                (prev, None) => prev,
            };
        }

        outcome
    }

    fn listener_count(&self, class: EventClass) -> usize {
        self.listeners.read().iter().filter(|s| s.class == class).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Modifiers;
    use parking_lot::Mutex;

    #[test]
    fn test_dispatch_in_subscription_order() {
        let element = Element::new("test");
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 1..=3 {
            let order = order.clone();
            element.on(EventClass::KeyUp, Arc::new(move |_: &KeyEvent| {
                order.lock().push(n);
                None
            }));
        }

        let outcome = element.dispatch(&KeyEvent::key_up("KeyA", Modifiers::new()));
        assert_eq!(outcome.notified, 3);
        assert_eq!(outcome.result, None);
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_dispatch_filters_by_class() {
        let element = Element::new("test");
        element.on(EventClass::KeyUp, Arc::new(|_: &KeyEvent| Some(true)));

        let outcome = element.dispatch(&KeyEvent::key_down("KeyA", Modifiers::new()));
        assert_eq!(outcome.notified, 0);
        assert!(!outcome.consumed());
        assert_eq!(element.listener_count(EventClass::KeyUp), 1);
        assert_eq!(element.listener_count(EventClass::KeyDown), 0);
    }

    #[test]
    fn test_consumed_result_is_sticky() {
        let element = Element::new("test");
        element.on(EventClass::KeyUp, Arc::new(|_: &KeyEvent| Some(true)));
        element.on(EventClass::KeyUp, Arc::new(|_: &KeyEvent| Some(false)));
        element.on(EventClass::KeyUp, Arc::new(|_: &KeyEvent| None));

        let outcome = element.dispatch(&KeyEvent::key_up("KeyA", Modifiers::new()));
        assert_eq!(outcome.result, Some(true));
        assert!(outcome.consumed());
    }

    #[test]
    fn test_listener_may_subscribe_during_dispatch() {
        let element = Arc::new(Element::new("test"));
        let inner = element.clone();
        element.on(EventClass::KeyUp, Arc::new(move |_: &KeyEvent| {
            inner.on(EventClass::KeyUp, Arc::new(|_: &KeyEvent| None));
            None
        }));

        let outcome = element.dispatch(&KeyEvent::key_up("KeyA", Modifiers::new()));
        assert_eq!(outcome.notified, 1);
        assert_eq!(element.listener_count(EventClass::KeyUp), 2);
    }
}
