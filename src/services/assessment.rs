//! Quiz grading. The score is always recomputed here from the stored
//! questions; a score claimed by the client never enters the system.

use crate::domain::models::TestQuestion;
use std::collections::HashMap;

/// Counts the submitted answers that match the category's questions.
///
/// `answers` is keyed by question index ("0", "1", ...). Indexes at or past
/// `total_questions`, and indexes with no stored question, score nothing.
pub fn compute_score(
    questions: &[TestQuestion],
    answers: &HashMap<String, String>,
    total_questions: i32,
) -> i32 {
    let mut score = 0;
    for index in 0..total_questions.max(0) {
        let Some(question) = questions.get(index as usize) else {
            break;
        };
        if let Some(answer) = answers.get(&index.to_string()) {
            if answer == &question.correct_answer {
                score += 1;
            }
        }
    }
    score
}

/// Feedback text banded on the score percentage: >=90 excellent, >=80 good,
/// >=70 fair, below that needs improvement.
pub fn feedback_for(score: i32, total_questions: i32) -> &'static str {
    let percentage = if total_questions > 0 {
        (score as f64 / total_questions as f64) * 100.0
    } else {
        0.0
    };

    if percentage >= 90.0 {
        "Excellent work! You have a strong understanding of communication skills. Keep practicing to maintain this level."
    } else if percentage >= 80.0 {
        "Good job! You have a solid foundation in communication skills. Focus on the areas where you missed questions."
    } else if percentage >= 70.0 {
        "Fair performance. You understand the basics but should review key concepts and practice more."
    } else {
        "You may benefit from additional study and practice. Consider reviewing the related articles and taking the test again."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn question(correct: &str) -> TestQuestion {
        TestQuestion {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            question: "Which behavior signals active listening?".to_string(),
            options: vec!["Nodding".to_string(), "Interrupting".to_string()],
            correct_answer: correct.to_string(),
            explanation: None,
        }
    }

    fn answers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn counts_only_matching_answers() {
        let questions = vec![question("Nodding"), question("Interrupting")];
        let submitted = answers(&[("0", "Nodding"), ("1", "Nodding")]);
        assert_eq!(compute_score(&questions, &submitted, 2), 1);
    }

    #[test]
    fn missing_answers_score_nothing() {
        let questions = vec![question("Nodding"), question("Interrupting")];
        let submitted = answers(&[("1", "Interrupting")]);
        assert_eq!(compute_score(&questions, &submitted, 2), 1);
        assert_eq!(compute_score(&questions, &HashMap::new(), 2), 0);
    }

    #[test]
    fn indexes_past_stored_questions_are_ignored() {
        let questions = vec![question("Nodding")];
        let submitted = answers(&[("0", "Nodding"), ("5", "Nodding")]);
        assert_eq!(compute_score(&questions, &submitted, 6), 1);
    }

    #[test]
    fn feedback_bands_at_the_documented_thresholds() {
        assert!(feedback_for(9, 10).starts_with("Excellent work!"));
        assert!(feedback_for(8, 10).starts_with("Good job!"));
        assert!(feedback_for(7, 10).starts_with("Fair performance."));
        assert!(feedback_for(6, 10).starts_with("You may benefit"));
        assert!(feedback_for(2, 2).starts_with("Excellent work!"));
        assert!(feedback_for(0, 1).starts_with("You may benefit"));
    }
}
