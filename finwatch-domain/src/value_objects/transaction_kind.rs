// Transaction kind value object
//
// The transaction store records the kind as free text, in Portuguese or
// English. The loader collapses every synonym onto one tagged variant so
// the detectors never compare raw strings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
    Dividend,
    Other,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
            TransactionKind::Transfer => "transfer",
            TransactionKind::Dividend => "dividend",
            TransactionKind::Other => "other",
        }
    }

    pub fn is_expense(&self) -> bool {
        matches!(self, TransactionKind::Expense)
    }

    pub fn is_income(&self) -> bool {
        matches!(self, TransactionKind::Income)
    }
}

impl From<&str> for TransactionKind {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "receita" | "income" | "entrada" => TransactionKind::Income,
            "despesa" | "saída" | "saida" | "pagamento" | "débito" | "debito" | "expense" => {
                TransactionKind::Expense
            }
            "transferência" | "transferencia" | "transfer" => TransactionKind::Transfer,
            "dividendo" | "dividend" => TransactionKind::Dividend,
            _ => TransactionKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expense_synonyms_collapse() {
        for raw in ["despesa", "Saída", "PAGAMENTO", "débito", "expense"] {
            assert_eq!(TransactionKind::from(raw), TransactionKind::Expense);
        }
    }

    #[test]
    fn unknown_kind_is_other() {
        assert_eq!(TransactionKind::from("estorno"), TransactionKind::Other);
    }
}
