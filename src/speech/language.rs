/// Resolve a language name or short code to a BCP-47 tag.
///
/// Unknown languages fall back to `en-US`.
pub fn language_code(language: &str) -> &'static str {
    match language.trim().to_ascii_lowercase().as_str() {
        "english" | "en" => "en-US",
        "spanish" | "es" => "es-ES",
        "french" | "fr" => "fr-FR",
        "german" | "de" => "de-DE",
        "italian" | "it" => "it-IT",
        "portuguese" | "pt" => "pt-BR",
        "japanese" | "ja" => "ja-JP",
        "chinese" | "zh" => "zh-CN",
        "korean" | "ko" => "ko-KR",
        "russian" | "ru" => "ru-RU",
        "dutch" | "nl" => "nl-NL",
        "hindi" | "hi" => "hi-IN",
        "arabic" | "ar" => "ar-SA",
        _ => "en-US",
    }
}
