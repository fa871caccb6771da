// vocabulary.rs — The closed set of posture-issue categories the detection
// model may choose from, and the fixed instructions sent with each request.

/// The eight posture-issue categories the backend is constrained to.
/// Detection responses may only name members of this list.
pub const ISSUE_VOCABULARY: [&str; 8] = [
    "Knee Over Toe",
    "Hunched Back",
    "Slouching",
    "Forward Neck Tilt",
    "Uneven Shoulders",
    "Swayback",
    "Pelvic Tilt",
    "Rounded Shoulders",
];

/// Build the detection instruction with the vocabulary embedded.
///
/// Pure function of the vocabulary; computed once at client construction.
pub fn build_detect_instruction(vocabulary: &[&str]) -> String {
    let listed = vocabulary
        .iter()
        .map(|issue| format!("- {issue}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a world-class physical therapist and posture expert. Your task is \
         to analyze the provided image of a person and identify any posture problems.\n\n\
         Identify any issues from the following list. Only return issues from this \
         list. If the posture is good, return an empty array for the issues.\n\n\
         Potential Issues:\n{listed}\n\n\
         Respond with a JSON object of the form {{\"issues\": [\"...\"]}} naming the \
         identified issues."
    )
}

/// Fixed instruction for the coaching-tip request.
pub fn recommend_instruction() -> &'static str {
    "You are a personal AI posture coach. You will receive information about \
     posture issues and give personalized recommendations on how to correct posture.\n\n\
     Give a single, concise, and simple tip to improve posture. Keep it under 20 words. \
     Respond with a JSON object of the form {\"recommendation\": \"...\"}."
}

/// True if `label` is a member of the closed vocabulary.
pub fn is_known_issue(label: &str) -> bool {
    ISSUE_VOCABULARY.contains(&label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_lists_every_category() {
        let instruction = build_detect_instruction(&ISSUE_VOCABULARY);
        for issue in ISSUE_VOCABULARY {
            assert!(
                instruction.contains(&format!("- {issue}")),
                "instruction missing vocabulary entry {issue:?}"
            );
        }
    }

    #[test]
    fn instruction_requires_closed_vocabulary() {
        let instruction = build_detect_instruction(&ISSUE_VOCABULARY);
        assert!(instruction.contains("Only return issues from this list"));
        assert!(instruction.contains("empty array"));
    }

    #[test]
    fn instruction_is_deterministic() {
        assert_eq!(
            build_detect_instruction(&ISSUE_VOCABULARY),
            build_detect_instruction(&ISSUE_VOCABULARY)
        );
    }

    #[test]
    fn recommend_instruction_bounds_length() {
        assert!(recommend_instruction().contains("under 20 words"));
    }

    #[test]
    fn vocabulary_membership() {
        assert!(is_known_issue("Slouching"));
        assert!(is_known_issue("Rounded Shoulders"));
        assert!(!is_known_issue("Bad Vibes"));
    }
}
