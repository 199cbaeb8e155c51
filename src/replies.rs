//! Fixed user-facing texts, in the languages the portfolio page ships.

/// Language of the texts returned to the visitor and written into the mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Pt,
}

impl Language {
    /// Maps a language tag such as `pt-BR` or `en` to a supported language.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.trim().split(['-', '_']).next().unwrap_or_default();
        match primary.to_ascii_lowercase().as_str() {
            "en" => Some(Self::En),
            "pt" => Some(Self::Pt),
            _ => None,
        }
    }

    /// Picks the first supported language of an `Accept-Language` header.
    ///
    /// Quality values are ignored; browsers already list tags by preference.
    pub fn negotiate(accept_language: Option<&str>, fallback: Self) -> Self {
        accept_language
            .into_iter()
            .flat_map(|header| header.split(','))
            .filter_map(|entry| entry.split(';').next())
            .find_map(Self::from_tag)
            .unwrap_or(fallback)
    }
}

/// Outcome of one contact submission as seen by the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Sent,
    RateLimited,
    Invalid,
    Failed,
}

impl Reply {
    pub fn text(self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Sent, Language::En) => "Message sent successfully! 😁",
            (Self::Sent, Language::Pt) => "Mensagem enviada com sucesso! 😁",
            (Self::RateLimited, Language::En) => "Too many requests. Please try again shortly.",
            (Self::RateLimited, Language::Pt) => {
                "Muitas requisições. Tente novamente em instantes."
            }
            (Self::Invalid, Language::En) => "Invalid data.",
            (Self::Invalid, Language::Pt) => "Dados inválidos.",
            (Self::Failed, Language::En) => "Internal error while sending the email.",
            (Self::Failed, Language::Pt) => "Erro interno ao enviar o email.",
        }
    }
}

/// Subject line of the relayed mail.
pub fn subject(name: &str, language: Language) -> String {
    match language {
        Language::En => format!("Website message from {name}"),
        Language::Pt => format!("Mensagem do site de {name}"),
    }
}

/// Label placed in front of the submitter's address in the mail bodies.
pub fn from_label(language: Language) -> &'static str {
    match language {
        Language::En => "From:",
        Language::Pt => "De:",
    }
}
