//! Mode Registry
//!
//! The fixed set of chat modes shown in the sidebar. Each mode bundles a
//! persona (name, description), the backing model, a system instruction,
//! the provider tools it may use, and a few suggested opening queries.
//!
//! The table is static data. Lookups by [`ModeId`] are total; parsing a
//! mode identifier from text is the only fallible operation here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fast model used by most modes
pub const MODEL_FAST: &str = "gemini-2.5-flash";
/// Reasoning model used where deeper analysis is needed
pub const MODEL_SMART: &str = "gemini-3-pro-preview";

/// Shared preamble of every system instruction. `{date}` is replaced with
/// the current local date when the instruction is built.
const BASE_INSTRUCTION: &str = "
Você é o **ComexGlobal AI**, um consultor de elite em Comércio Exterior, Logística Internacional e Direito Aduaneiro.
Sua expertise cobre tanto a legislação brasileira (Receita Federal, SISCOMEX, Regulamento Aduaneiro) quanto regras internacionais (OMC, ICC, HS Convention).

**Diretrizes Gerais:**
1. **Profissionalismo:** Use linguagem formal, técnica, mas acessível.
2. **Imparcialidade:** Apresente riscos e benefícios.
3. **Fundamentação:** Sempre que possível, cite a base legal (ex: Art. X do Regulamento Aduaneiro, IN RFB nº Y, Incoterms 2020).
4. **Formatação:** Use Markdown. Use tabelas para comparar dados, taxas ou Incoterms. Use negrito para termos chave.
5. **Data:** Hoje é {date}.
";

/// Mode identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeId {
    /// General foreign-trade advisor
    General,
    /// HS/NCM tariff classifier
    Ncm,
    /// Customs-law specialist
    Legal,
    /// Trade document drafter
    Docs,
}

impl ModeId {
    /// All identifiers in sidebar order
    pub const ALL: [ModeId; 4] = [ModeId::General, ModeId::Ncm, ModeId::Legal, ModeId::Docs];

    /// Stable textual identifier
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Ncm => "ncm",
            Self::Legal => "legal",
            Self::Docs => "docs",
        }
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when text does not name a known mode
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown mode: {0:?} (expected one of: general, ncm, legal, docs)")]
pub struct UnknownModeError(pub String);

impl FromStr for ModeId {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ModeId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| UnknownModeError(s.to_string()))
    }
}

/// A provider-side tool a mode may enable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tool {
    /// Google Search grounding
    GoogleSearch,
}

/// Static configuration of one mode
#[derive(Debug)]
pub struct Mode {
    /// Identifier
    pub id: ModeId,
    /// Display name
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Backing model identifier
    pub model: &'static str,
    /// Mode-specific part of the system instruction
    instructions: &'static str,
    /// Enabled provider tools, in order
    pub tools: &'static [Tool],
    /// Suggested opening queries, in display order
    pub suggested_queries: &'static [&'static str],
}

impl Mode {
    /// Full system instruction: shared preamble (dated today) followed by
    /// the mode-specific part
    #[must_use]
    pub fn system_instruction(&self) -> String {
        let date = chrono::Local::now().format("%d/%m/%Y").to_string();
        let mut instruction = BASE_INSTRUCTION.replace("{date}", &date);
        instruction.push_str(self.instructions);
        instruction
    }

    /// Welcome text shown as the first bot message after selecting the mode
    #[must_use]
    pub fn welcome_text(&self) -> String {
        format!(
            "Olá! Sou o **{}**. \n\n{}\n\nComo posso ajudar com seus processos de comércio exterior hoje?",
            self.name, self.description
        )
    }

    /// Whether the provider may ground answers with web search
    #[must_use]
    pub fn uses_search(&self) -> bool {
        self.tools.contains(&Tool::GoogleSearch)
    }
}

static MODES: [Mode; 4] = [
    Mode {
        id: ModeId::General,
        name: "Consultor Geral",
        description: "Tire dúvidas sobre importação, exportação e logística.",
        model: MODEL_FAST,
        instructions: "
    Atue como um gerente de Supply Chain global. Responda sobre rotas logísticas, custos estimados, taxas de câmbio atuais (se solicitado, use a tool de busca), e visão geral de processos.",
        tools: &[Tool::GoogleSearch],
        suggested_queries: &[
            "Quais os documentos necessários para exportar soja para a China?",
            "Explique a diferença entre FOB e CIF nos Incoterms 2020.",
            "Qual a alíquota atual do Imposto de Importação para eletrônicos?",
            "Como funciona o Drawback Suspensão?",
        ],
    },
    Mode {
        id: ModeId::Ncm,
        name: "Classificador NCM/HS",
        description: "Especialista em classificação fiscal de mercadorias.",
        model: MODEL_FAST,
        instructions: "
    Seu foco ÚNICO é a classificação fiscal (NCM/SH).

    **Metodologia:**
    1. Peça detalhes técnicos do produto se a descrição for vaga (composição, uso, funcionamento).
    2. Analise as Regras Gerais de Interpretação (RGI) do Sistema Harmonizado.
    3. Sugira o código NCM (8 dígitos no Brasil) mais provável.
    4. Liste as alíquotas básicas (II, IPI) associadas se souber, ou recomende consulta à TEC atualizada.
    5. Sempre alerte que a classificação final é responsabilidade do importador e sujeita a análise da Receita.",
        tools: &[],
        suggested_queries: &[
            "Qual a NCM para 'Smartphones'?",
            "Classifique um 'Rolamento de esferas de aço'.",
            "NCM para 'Vinho tinto cabernet sauvignon'.",
            "Diferença de classificação entre drone de brinquedo e profissional.",
        ],
    },
    Mode {
        id: ModeId::Legal,
        name: "Jurídico Aduaneiro",
        description: "Análise de regulamentos, multas e procedimentos especiais.",
        model: MODEL_SMART,
        instructions: "
    Atue como um advogado especialista em Direito Aduaneiro.
    Analise questões sobre infrações, multas, perdimento, valoração aduaneira, ex-tarifário e regimes especiais.
    Use raciocínio lógico profundo. Cite a legislação pertinente (Regulamento Aduaneiro - Decreto 6.759/09).",
        tools: &[Tool::GoogleSearch],
        suggested_queries: &[
            "Quais os riscos de subfaturamento na importação?",
            "Como responder a uma intimação fiscal de valoração aduaneira?",
            "Requisitos para habilitação no Radar (Siscomex).",
            "Penalidades por erro de classificação fiscal.",
        ],
    },
    Mode {
        id: ModeId::Docs,
        name: "Redator de Docs",
        description: "Gere rascunhos de Invoice, Packing List e emails comerciais.",
        model: MODEL_FAST,
        instructions: "
    Gere minutas e modelos de documentos.
    Se o usuário pedir uma Commercial Invoice, crie uma estrutura completa com campos de Exporter, Consignee, Incoterm, HS Code, etc.
    Se for email, escreva em Inglês Business ou Português Formal conforme solicitado.",
        tools: &[],
        suggested_queries: &[
            "Gere um modelo de Commercial Invoice para exportação.",
            "Escreva um email em inglês cobrando o Booking do Agente de Carga.",
            "Modelo de Packing List para container consolidado.",
            "Minuta de Procuração para Despachante Aduaneiro.",
        ],
    },
];

/// Look up a mode by identifier
#[must_use]
pub fn get_mode(id: ModeId) -> &'static Mode {
    match id {
        ModeId::General => &MODES[0],
        ModeId::Ncm => &MODES[1],
        ModeId::Legal => &MODES[2],
        ModeId::Docs => &MODES[3],
    }
}

/// All modes in sidebar order
#[must_use]
pub fn all_modes() -> &'static [Mode] {
    &MODES
}
