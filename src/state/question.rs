//! Arithmetic question generation for each difficulty tier.

use std::{fmt, ops::RangeInclusive};

use rand::{Rng, seq::IndexedRandom};
use serde::Serialize;
use utoipa::ToSchema;

/// Difficulty tier bounding the operands of generated questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Operands between 1 and 10.
    #[default]
    Easy,
    /// Operands between 10 and 59.
    Medium,
    /// Operands between 10 and 99.
    Hard,
}

impl Difficulty {
    /// Parse a client-supplied tier; missing or unknown values fall back to [`Difficulty::Easy`].
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("medium") => Difficulty::Medium,
            Some("hard") => Difficulty::Hard,
            _ => Difficulty::Easy,
        }
    }

    /// Closed range both operands are drawn from.
    pub fn operand_range(self) -> RangeInclusive<i64> {
        match self {
            Difficulty::Easy => 1..=10,
            Difficulty::Medium => 10..=59,
            Difficulty::Hard => 10..=99,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(label)
    }
}

/// Arithmetic operator used in a question. Division is never generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
}

impl Operator {
    /// Every operator, drawn from uniformly.
    pub const ALL: [Operator; 3] = [Operator::Add, Operator::Subtract, Operator::Multiply];

    /// Exact integer result of applying the operator.
    pub fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Subtract => lhs - rhs,
            Operator::Multiply => lhs * rhs,
        }
    }

    fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
        }
    }
}

/// A single round's prompt together with its exact answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Left operand.
    pub lhs: i64,
    /// Operator between the operands.
    pub operator: Operator,
    /// Right operand.
    pub rhs: i64,
    /// Exact value the expression evaluates to.
    pub answer: i64,
}

impl Question {
    /// Build the question for fixed operands; the answer is fully determined by them.
    pub fn from_operands(lhs: i64, operator: Operator, rhs: i64) -> Self {
        Self {
            lhs,
            operator,
            rhs,
            answer: operator.apply(lhs, rhs),
        }
    }

    /// Human readable expression, e.g. `7 * 3`.
    pub fn prompt(&self) -> String {
        format!("{} {} {}", self.lhs, self.operator.symbol(), self.rhs)
    }
}

/// Draw a random question for `difficulty`.
pub fn generate<R: Rng>(difficulty: Difficulty, rng: &mut R) -> Question {
    let operator = Operator::ALL.choose(rng).copied().unwrap_or(Operator::Add);
    let lhs = rng.random_range(difficulty.operand_range());
    let rhs = rng.random_range(difficulty.operand_range());
    Question::from_operands(lhs, operator, rhs)
}
