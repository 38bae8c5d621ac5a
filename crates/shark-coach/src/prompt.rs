//! Prompt builders for the coach persona.

/// System instruction for the live coaching session.
pub fn coach_instruction(skill_level: u8) -> String {
    format!(
        "Technical Billiards Coach for player level {skill_level}. \
         Tone: Direct, tactical, professional. \
         Analyze the video feed for table layout and form."
    )
}

/// Prompt sent alongside a session snapshot during review.
pub fn review_prompt(question: &str, skill_level: u8) -> String {
    format!(
        "The user is reviewing a past session and asking about this specific moment.\n\
         Question: {question}.\n\
         Player Skill: {skill_level}/10.\n\
         Analyze the balls on the table and provide technical advice on how they \
         should have played the shot or the rest of the game."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coach_instruction_includes_level() {
        let instruction = coach_instruction(7);
        assert!(instruction.starts_with("Technical Billiards Coach for player level 7."));
        assert!(instruction.contains("Direct, tactical, professional"));
    }

    #[test]
    fn test_review_prompt_includes_question_and_skill() {
        let prompt = review_prompt("Why did I miss the cut?", 4);
        assert!(prompt.contains("Question: Why did I miss the cut?."));
        assert!(prompt.contains("Player Skill: 4/10."));
    }
}
