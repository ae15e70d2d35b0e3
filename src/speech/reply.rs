const DEFAULT_REPLIES: [&str; 6] = [
    "That's interesting! Could you tell me more about that?",
    "I see. How does that make you feel?",
    "Let's explore that topic further. What else do you know about it?",
    "Good point. Could you expand on that idea?",
    "I understand. Let's practice some vocabulary related to this topic.",
    "Great job with your pronunciation! Let's continue the conversation.",
];

/// Scripted coach replies for simulated calls. No external calls.
#[derive(Debug, Clone)]
pub struct ReplyGenerator {
    scenario_title: String,
    language_code: &'static str,
}

impl ReplyGenerator {
    pub fn new(scenario_title: impl Into<String>, language_code: &'static str) -> Self {
        Self {
            scenario_title: scenario_title.into(),
            language_code,
        }
    }

    /// Reply to `input`; `turn` counts replies already given
    pub fn reply(&self, input: &str, turn: usize) -> String {
        if turn == 0 {
            return self.greeting();
        }

        let lowered = input.to_lowercase();
        let has_word = |word: &str| lowered.split(|c: char| !c.is_alphanumeric()).any(|w| w == word);

        if has_word("hello") || has_word("hi") {
            return "Hello! It's great to be practicing with you today. How can I help you with your language learning?".to_string();
        }
        if lowered.contains("how are you") {
            return "I'm doing well, thank you for asking! How about you? How has your language learning journey been going?".to_string();
        }
        if lowered.contains("weather") {
            return "Discussing the weather is a great way to practice everyday conversation. What's the weather like where you are?".to_string();
        }
        if lowered.contains("difficult") || lowered.contains("hard") {
            return "Language learning can be challenging sometimes. What specific aspects are you finding difficult? We can work on them together.".to_string();
        }
        if lowered.contains("thank") {
            return "You're welcome! It's my pleasure to help you practice. Is there anything specific you'd like to focus on today?".to_string();
        }

        DEFAULT_REPLIES[(turn - 1) % DEFAULT_REPLIES.len()].to_string()
    }

    fn greeting(&self) -> String {
        let title = self.scenario_title.as_str();
        match self.language_code {
            "es-ES" => format!(
                "¡Hola! Soy tu profesor de idiomas. Vamos a practicar {}. ¿Cómo estás hoy?",
                or(title, "conversación")
            ),
            "fr-FR" => format!(
                "Bonjour! Je suis votre professeur de langue. Nous allons pratiquer {}. Comment allez-vous aujourd'hui?",
                or(title, "conversation")
            ),
            "de-DE" => format!(
                "Hallo! Ich bin dein Sprachlehrer. Wir werden {} üben. Wie geht es dir heute?",
                or(title, "Konversation")
            ),
            _ => format!(
                "Hi there! I'm your language coach for today. We'll be practicing {}. How are you doing today?",
                or(title, "conversation")
            ),
        }
    }
}

fn or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_turn_greets_in_session_language() {
        let gen = ReplyGenerator::new("Hotel check-in", "es-ES");
        let greeting = gen.reply("hola", 0);
        assert!(greeting.starts_with("¡Hola!"));
        assert!(greeting.contains("Hotel check-in"));

        let gen = ReplyGenerator::new("", "ja-JP");
        assert!(gen.reply("", 0).contains("practicing conversation"));
    }

    #[test]
    fn patterns_match_on_later_turns() {
        let gen = ReplyGenerator::new("Small talk", "en-US");
        assert!(gen.reply("Hi again", 1).starts_with("Hello!"));
        assert!(gen.reply("The weather is nice", 2).contains("weather"));
        assert!(gen.reply("This is hard", 3).contains("challenging"));
        assert!(gen.reply("Thanks a lot", 4).starts_with("You're welcome"));
        // "this" must not trigger the greeting pattern
        assert!(!gen.reply("this thing", 5).starts_with("Hello!"));
    }

    #[test]
    fn default_replies_rotate_deterministically() {
        let gen = ReplyGenerator::new("Small talk", "en-US");
        assert_eq!(gen.reply("I like trains", 1), DEFAULT_REPLIES[0]);
        assert_eq!(gen.reply("I like trains", 2), DEFAULT_REPLIES[1]);
        assert_eq!(gen.reply("I like trains", 7), DEFAULT_REPLIES[0]);
    }
}
