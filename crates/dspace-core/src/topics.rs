//! Menu buttons, suggestion topics and the resolver that links them.
//!
//! A menu button carries a trigger question and a topic name. When a visitor's message equals a
//! trigger (after normalization) the topic's quick replies are offered next; everything else
//! gets the reserved [`DEFAULT_TOPIC`].

use crate::text::normalize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved topic that must always resolve to a non-empty list.
pub const DEFAULT_TOPIC: &str = "default";

/// Categories that always exist and cannot be deleted.
pub const SYSTEM_CATEGORIES: [(&str, &str); 4] = [
    ("attractions", "🎪 Аттракционы"),
    ("events", "🎉 Мероприятия"),
    ("services", "🛠️ Услуги"),
    ("info", "ℹ️ Информация"),
];

fn default_category() -> String {
    "attractions".to_string()
}

fn default_topic_name() -> String {
    DEFAULT_TOPIC.to_string()
}

/// One chat menu button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Label shown in the admin panel.
    pub admin_text: String,
    /// Label shown to visitors.
    pub display_text: String,
    /// Message sent when the button is pressed.
    pub question: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub price_info: String,
    #[serde(default = "default_topic_name")]
    pub suggestion_topic: String,
}

impl MenuItem {
    pub fn new(
        admin_text: impl Into<String>,
        display_text: impl Into<String>,
        question: impl Into<String>,
        category: impl Into<String>,
        price_info: impl Into<String>,
        suggestion_topic: impl Into<String>,
    ) -> Self {
        Self {
            admin_text: admin_text.into(),
            display_text: display_text.into(),
            question: question.into(),
            category: category.into(),
            price_info: price_info.into(),
            suggestion_topic: suggestion_topic.into(),
        }
    }
}

/// A quick reply with its canned answer. Stored on disk with the label under `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "text", alias = "label")]
    pub label: String,
    pub question: String,
    pub answer: String,
}

impl Suggestion {
    pub fn new(label: impl Into<String>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            question: question.into(),
            answer: answer.into(),
        }
    }

    pub fn button(&self) -> SuggestionButton {
        SuggestionButton {
            label: self.label.clone(),
            question: self.question.clone(),
        }
    }
}

/// What the widget renders: a suggestion without its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionButton {
    pub label: String,
    pub question: String,
}

/// Topic name -> ordered suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuggestionTopics(BTreeMap<String, Vec<Suggestion>>);

impl SuggestionTopics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, topic: &str) -> Option<&[Suggestion]> {
        self.0.get(topic).map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, topic: &str) -> Option<&mut Vec<Suggestion>> {
        self.0.get_mut(topic)
    }

    pub fn topic_mut(&mut self, topic: &str) -> &mut Vec<Suggestion> {
        self.0.entry(topic.to_string()).or_default()
    }

    pub fn insert(&mut self, topic: impl Into<String>, suggestions: Vec<Suggestion>) {
        self.0.insert(topic.into(), suggestions);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Suggestion])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// The default topic's list, empty only when the catalog was never seeded.
    pub fn default_list(&self) -> &[Suggestion] {
        self.get(DEFAULT_TOPIC).unwrap_or(&[])
    }

    /// Re-seeds the default topic if it is missing or empty. Returns true when it changed.
    pub fn ensure_default(&mut self) -> bool {
        if self.default_list().is_empty() {
            self.insert(DEFAULT_TOPIC, default_fallback_suggestions());
            true
        } else {
            false
        }
    }
}

impl FromIterator<(String, Vec<Suggestion>)> for SuggestionTopics {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Suggestion>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Category key -> display name (flat on disk, system categories included).
pub type MenuCategories = BTreeMap<String, String>;

pub fn is_system_category(key: &str) -> bool {
    SYSTEM_CATEGORIES.iter().any(|(k, _)| *k == key)
}

/// Topic attached to the first menu button whose trigger matches the question.
pub fn resolve_topic<'m>(raw_question: &str, menu: &'m [MenuItem]) -> Option<&'m str> {
    let question = normalize(raw_question);
    menu.iter()
        .find(|item| normalize(&item.question) == question)
        .map(|item| item.suggestion_topic.as_str())
}

/// Suggestions to render for a topic; unknown or absent topics fall back to [`DEFAULT_TOPIC`].
pub fn suggestion_list<'t>(topic: Option<&str>, topics: &'t SuggestionTopics) -> &'t [Suggestion] {
    topic
        .and_then(|name| topics.get(name))
        .unwrap_or_else(|| topics.default_list())
}

/// Buttons (label + question) for a topic, answers stripped.
pub fn suggestions_for(topic: Option<&str>, topics: &SuggestionTopics) -> Vec<SuggestionButton> {
    suggestion_list(topic, topics)
        .iter()
        .map(Suggestion::button)
        .collect()
}

/// Canned answer of the first suggestion whose trigger matches the question.
pub fn answer_for<'s>(raw_question: &str, suggestions: &'s [Suggestion]) -> Option<&'s str> {
    let question = normalize(raw_question);
    suggestions
        .iter()
        .find(|s| normalize(&s.question) == question)
        .map(|s| s.answer.as_str())
}

/// Like [`answer_for`] but across every topic, in topic-name order.
pub fn answer_in_any_topic<'t>(raw_question: &str, topics: &'t SuggestionTopics) -> Option<&'t str> {
    topics.iter().find_map(|(_, list)| answer_for(raw_question, list))
}

fn default_fallback_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion::new(
            "Забронировать",
            "хочу забронировать",
            "Перейдите на страницу бронирования для оформления заказа! 📋",
        ),
        Suggestion::new(
            "Цены",
            "цены",
            "Цены зависят от выбранного аттракциона. Уточните у нашего менеджера! 💵",
        ),
    ]
}

/// Seed topics used when storage has nothing yet.
pub fn default_topics() -> SuggestionTopics {
    let mut topics = SuggestionTopics::new();
    topics.insert(
        "vr",
        vec![
            Suggestion::new("Игры", "игры в vr", "У нас есть различные VR-игры: экшены, гонки, головоломки! 🎮"),
            Suggestion::new("Цены", "стоимость vr", "VR-сеанс стоит от 300 рублей за 30 минут! 💰"),
            Suggestion::new("Забронировать", "забронировать vr", "Чтобы забронировать VR, перейдите на страницу бронирования! 📅"),
            Suggestion::new("Правила", "правила безопасности в vr", "В VR-зоне необходимо соблюдать технику безопасности! ⚠️"),
        ],
    );
    topics.insert(
        "батуты",
        vec![
            Suggestion::new("Для деток?", "можно ли на батуты с маленькими детьми", "Да, у нас есть специальные батуты для детей от 3 лет! 👶"),
            Suggestion::new("Цены", "стоимость батутов", "Батутный центр - от 500 рублей за час! 🏀"),
            Suggestion::new("Забронировать", "забронировать батуты", "Забронируйте батуты через нашу систему бронирования! 🎯"),
            Suggestion::new("Аниматор", "есть ли аниматор на батуты", "Да, мы предоставляем услуги аниматора для детских праздников! 🎪"),
        ],
    );
    topics.insert(DEFAULT_TOPIC, default_fallback_suggestions());
    topics
}

/// Seed menu used when storage has nothing yet.
pub fn default_menu() -> Vec<MenuItem> {
    vec![
        MenuItem::new("VR-зоны", "🎮 VR-зоны — от 300 ₽", "vr", "attractions", "от 300 ₽", "vr"),
        MenuItem::new("Батуты", "🏀 Батутный центр — от 500 ₽", "батуты", "attractions", "от 500 ₽", "батуты"),
        MenuItem::new("Нерф", "🔫 Нерф-арена — от 2500 ₽", "нерф", "attractions", "от 2500 ₽", DEFAULT_TOPIC),
        MenuItem::new("День рождения", "🎉 День рождения", "день рождения", "events", "", DEFAULT_TOPIC),
        MenuItem::new("Выпускные", "🎓 Выпускные", "выпускные", "events", "", DEFAULT_TOPIC),
        MenuItem::new("Мероприятия", "🎪 Мероприятия", "мероприятия", "events", "", DEFAULT_TOPIC),
    ]
}

/// Seed categories: the system set.
pub fn default_categories() -> MenuCategories {
    SYSTEM_CATEGORIES
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_topic_ignores_case() {
        let menu = vec![MenuItem::new("VR", "VR", "вр", "attractions", "", "vr")];
        assert_eq!(resolve_topic("ВР", &menu), Some("vr"));
        assert_eq!(resolve_topic("  вр! ", &menu), Some("vr"));
        assert_eq!(resolve_topic("нерф", &menu), None);
    }

    #[test]
    fn test_resolve_topic_latin_trigger() {
        let menu = default_menu();
        assert_eq!(resolve_topic("VR", &menu), Some("vr"));
        assert_eq!(resolve_topic("День Рождения!", &menu), Some(DEFAULT_TOPIC));
    }

    #[test]
    fn test_resolve_topic_first_match_wins() {
        let menu = vec![
            MenuItem::new("a", "a", "цены", "info", "", "first"),
            MenuItem::new("b", "b", "Цены", "info", "", "second"),
        ];
        assert_eq!(resolve_topic("цены", &menu), Some("first"));
    }

    #[test]
    fn test_unknown_topic_falls_back_to_default() {
        let topics = default_topics();
        let fallback = suggestions_for(None, &topics);
        assert!(!fallback.is_empty());
        assert_eq!(suggestions_for(Some("нет такой темы"), &topics), fallback);
        assert_eq!(fallback[0].label, "Забронировать");
    }

    #[test]
    fn test_known_topic_keeps_order_and_strips_answers() {
        let topics = default_topics();
        let labels: Vec<String> = suggestions_for(Some("vr"), &topics)
            .into_iter()
            .map(|b| b.label)
            .collect();
        assert_eq!(labels, vec!["Игры", "Цены", "Забронировать", "Правила"]);
        let json = serde_json::to_value(suggestions_for(Some("vr"), &topics)).unwrap();
        assert!(json[0].get("answer").is_none());
    }

    #[test]
    fn test_answer_for_normalizes_trigger() {
        let topics = default_topics();
        let list = topics.get("vr").unwrap();
        assert_eq!(
            answer_for("Стоимость VR?", list),
            Some("VR-сеанс стоит от 300 рублей за 30 минут! 💰")
        );
        assert_eq!(answer_for("стоимость батутов", list), None);
    }

    #[test]
    fn test_answer_in_any_topic() {
        let topics = default_topics();
        assert!(answer_in_any_topic("Стоимость батутов", &topics)
            .unwrap()
            .contains("500"));
        assert!(answer_in_any_topic("неизвестно", &topics).is_none());
    }

    #[test]
    fn test_ensure_default_reseeds() {
        let mut topics = SuggestionTopics::new();
        topics.insert(DEFAULT_TOPIC, Vec::new());
        assert!(topics.ensure_default());
        assert!(!topics.default_list().is_empty());
        assert!(!topics.ensure_default());
    }

    #[test]
    fn test_suggestion_disk_format_uses_text_key() {
        let s = Suggestion::new("Цены", "цены", "ответ");
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["text"], "Цены");
        let back: Suggestion =
            serde_json::from_str(r#"{"label":"Цены","question":"цены","answer":"ответ"}"#).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_menu_item_defaults() {
        let item: MenuItem = serde_json::from_str(
            r#"{"admin_text":"a","display_text":"b","question":"c"}"#,
        )
        .unwrap();
        assert_eq!(item.category, "attractions");
        assert_eq!(item.suggestion_topic, DEFAULT_TOPIC);
        assert_eq!(item.price_info, "");
    }
}
