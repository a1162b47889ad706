//! RuleBasedResponder - deterministic replies used when the remote assistant
//! is not configured or fails.
//!
//! Replies are picked by keyword rules. The portal the user is in (derived
//! from the location) selects the generic help text, and a caller id adds a
//! greeting. No network I/O.

use async_trait::async_trait;
use carelink_core::conversation::{LocalResponder, OutboundUserMessage};
use carelink_core::error::Result;

/// Portal of the web front end, derived from the location prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Portal {
    Patient,
    Clinician,
    Student,
    Admin,
}

impl Portal {
    pub fn from_location(location: &str) -> Option<Self> {
        let first_segment = location
            .trim()
            .trim_start_matches('/')
            .split(['/', '?', '#'])
            .next()
            .map(fold)?;

        match first_segment.as_str() {
            "paciente" | "patient" => Some(Self::Patient),
            "medico" | "clinico" | "clinician" | "prescritor" => Some(Self::Clinician),
            "aluno" | "estudante" | "student" => Some(Self::Student),
            "admin" | "administrador" => Some(Self::Admin),
            _ => None,
        }
    }

    fn help_text(&self) -> &'static str {
        match self {
            Self::Patient => {
                "Posso ajudar com agendamento de consultas, renovação de receitas e dúvidas gerais sobre o tratamento."
            }
            Self::Clinician => {
                "Posso ajudar com a agenda de atendimentos, prontuários e protocolos de prescrição."
            }
            Self::Student => "Posso ajudar com os cursos, as aulas gravadas e os certificados.",
            Self::Admin => "Posso ajudar com cadastros de usuários, relatórios e configurações da plataforma.",
        }
    }
}

/// A keyword rule. Keywords are matched after lowercasing and accent folding.
#[derive(Debug, Clone)]
pub struct KnowledgeRule {
    pub keywords: Vec<String>,
    pub reply: String,
}

impl KnowledgeRule {
    pub fn new(keywords: &[&str], reply: impl Into<String>) -> Self {
        Self {
            keywords: keywords.iter().map(|k| fold(k)).collect(),
            reply: reply.into(),
        }
    }

    fn score(&self, folded_text: &str) -> usize {
        self.keywords
            .iter()
            .filter(|keyword| folded_text.contains(keyword.as_str()))
            .count()
    }
}

pub struct RuleBasedResponder {
    rules: Vec<KnowledgeRule>,
    fallback_reply: String,
}

impl RuleBasedResponder {
    pub fn new(rules: Vec<KnowledgeRule>) -> Self {
        Self {
            rules,
            fallback_reply: "Não encontrei uma resposta para isso agora. \
Nossa equipe pode ajudar pelo canal de suporte."
                .to_string(),
        }
    }

    pub fn with_fallback_reply(mut self, reply: impl Into<String>) -> Self {
        self.fallback_reply = reply.into();
        self
    }

    /// Builds the reply for `message`.
    pub fn compose(&self, message: &OutboundUserMessage) -> String {
        let folded = fold(&message.text);
        let portal = message.location.as_deref().and_then(Portal::from_location);

        let best = self
            .rules
            .iter()
            .map(|rule| (rule.score(&folded), rule))
            .filter(|(score, _)| *score > 0)
            .fold(None::<(usize, &KnowledgeRule)>, |best, candidate| match best {
                Some(current) if current.0 >= candidate.0 => Some(current),
                _ => Some(candidate),
            });

        let body = match (best, portal) {
            (Some((_, rule)), _) => rule.reply.clone(),
            (None, Some(portal)) => portal.help_text().to_string(),
            (None, None) => self.fallback_reply.clone(),
        };

        match message
            .caller_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            Some(caller) => format!("Olá, {caller}! {body}"),
            None => body,
        }
    }
}

impl Default for RuleBasedResponder {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

#[async_trait]
impl LocalResponder for RuleBasedResponder {
    async fn generate(&self, message: &OutboundUserMessage) -> Result<String> {
        Ok(self.compose(message))
    }
}

fn default_rules() -> Vec<KnowledgeRule> {
    vec![
        KnowledgeRule::new(
            &["consulta", "agendar", "agendamento", "horario"],
            "Para agendar uma consulta, acesse a aba Agenda e escolha um horário disponível com o seu profissional.",
        ),
        KnowledgeRule::new(
            &["receita", "prescricao", "renovar"],
            "A renovação de receita é feita pelo seu médico após uma consulta de acompanhamento. Solicite pela aba Receitas.",
        ),
        KnowledgeRule::new(
            &["dose", "dosagem", "posologia", "cbd", "oleo"],
            "A dose é sempre individual e definida pelo seu médico. Siga a prescrição e, em caso de dúvida, agende um retorno.",
        ),
        KnowledgeRule::new(
            &["efeito", "colateral", "reacao", "sonolencia"],
            "Se notar efeitos indesejados, registre no diário de sintomas e fale com seu médico. Em caso de urgência, procure atendimento presencial.",
        ),
        KnowledgeRule::new(
            &["curso", "aula", "modulo", "certificado"],
            "Os cursos ficam na aba Educação. O certificado é liberado após concluir todas as aulas e a avaliação final.",
        ),
        KnowledgeRule::new(
            &["senha", "login", "acesso", "entrar"],
            "Para recuperar o acesso, use a opção 'Esqueci minha senha' na tela de login.",
        ),
    ]
}

/// Lowercases and strips the Portuguese diacritics.
fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}
