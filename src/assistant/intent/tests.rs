use super::*;

fn classify(text: &str) -> IntentScore {
    KeywordIntentClassifier.classify(text)
}

#[test]
fn labels_round_trip() {
    for intent in [Intent::Greeting, Intent::Recommendation, Intent::Escalation] {
        assert_eq!(Intent::from_label(intent.label()), Some(intent));
    }
    assert_eq!(Intent::from_label("что-то ещё"), None);
    assert_eq!(Intent::Escalation.to_string(), "вызов администратора");
}

#[test]
fn bare_greeting() {
    let score = classify("Здравствуйте!");
    assert_eq!(score.intent, Intent::Greeting);
    assert_eq!(resolve(score, 0.7), Intent::Greeting);

    assert_eq!(classify("Добрый день").intent, Intent::Greeting);
    assert_eq!(classify("привет, бот").intent, Intent::Greeting);
}

#[test]
fn greeting_with_question_falls_back_to_recommendation() {
    let score = classify("Здравствуйте, подскажите как оформить кредитную карту?");
    assert_eq!(score.intent, Intent::Greeting);
    assert!(score.score < 0.7);
    assert_eq!(resolve(score, 0.7), Intent::Recommendation);
}

#[test]
fn short_greeting_with_question_is_not_canned() {
    for text in [
        "Привет, где мой перевод?",
        "Добрый вечер, где мой перевод",
        "hi, card blocked",
    ] {
        let score = classify(text);
        assert_eq!(score.intent, Intent::Greeting, "{}", text);
        assert_eq!(resolve(score, 0.7), Intent::Recommendation, "{}", text);
    }
}

#[test]
fn greeting_with_fillers_stays_confident() {
    for text in ["Привет всем", "Hello there!", "Добрый день, ассистент", "Здравствуйте снова"] {
        assert_eq!(resolve(classify(text), 0.7), Intent::Greeting, "{}", text);
    }
    assert_eq!(resolve(classify("Привет?"), 0.7), Intent::Recommendation);
}

#[test]
fn escalation_keywords() {
    assert_eq!(
        resolve(classify("Позовите администратора"), 0.7),
        Intent::Escalation
    );
    assert_eq!(
        resolve(classify("Хочу поговорить с живым оператором"), 0.7),
        Intent::Escalation
    );
    assert_eq!(
        resolve(classify("Привет, соедините с живым человеком"), 0.7),
        Intent::Escalation
    );
}

#[test]
fn short_keywords_match_whole_words_only() {
    assert_eq!(classify("hi").intent, Intent::Greeting);
    assert_eq!(classify("history of payments").intent, Intent::Recommendation);
}

#[test]
fn regular_question_is_recommendation() {
    let score = classify("Как закрыть счёт?");
    assert_eq!(score.intent, Intent::Recommendation);
    assert_eq!(resolve(score, 0.7), Intent::Recommendation);
}

#[test]
fn threshold_is_inclusive() {
    let score = IntentScore {
        intent: Intent::Escalation,
        score: 0.7,
    };
    assert_eq!(resolve(score, 0.7), Intent::Escalation);
    assert_eq!(resolve(score, 0.71), Intent::Recommendation);
}
