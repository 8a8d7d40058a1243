//! Built-in student persona presets.
//!
//! Three calibration tiers used by the closed loop: an excellent student,
//! an average student, and a struggling student.

use super::model::{
    EngagementLevel, Persona, PersonaType, QuestionFrequency, ResponseLength,
};

/// Preset identifier for the excellent-student persona.
pub const EXCELLENT: &str = "excellent";
/// Preset identifier for the average-student persona.
pub const AVERAGE: &str = "average";
/// Preset identifier for the struggling-student persona.
pub const STRUGGLING: &str = "struggling";

/// Returns the ids of all built-in presets, in tier order.
pub fn preset_ids() -> Vec<&'static str> {
    vec![EXCELLENT, AVERAGE, STRUGGLING]
}

/// Looks up a built-in preset by id.
pub fn preset(id: &str) -> Option<Persona> {
    match id {
        EXCELLENT => Some(excellent()),
        AVERAGE => Some(average()),
        STRUGGLING => Some(struggling()),
        _ => None,
    }
}

fn excellent() -> Persona {
    Persona {
        name: "Excellent student".to_string(),
        persona_type: PersonaType::Preset,
        background: "Top of the class with broad knowledge and a serious attitude toward study."
            .to_string(),
        personality: "Focused, diligent, reflective, and articulate.".to_string(),
        goal: "Understand the material deeply and perform at the highest level.".to_string(),
        knowledge_level: "Solid fundamentals with fairly deep knowledge of related fields."
            .to_string(),
        learning_style: "Self-driven; asks good questions and generalizes from examples."
            .to_string(),
        interaction_style: "Engages actively, answers accurately, and pushes discussions deeper."
            .to_string(),
        strengths: vec![
            "Grasps the key point of a question quickly".to_string(),
            "Answers with clear, well-ordered reasoning".to_string(),
            "Connects new material to prior knowledge unprompted".to_string(),
            "Spots gaps and raises thoughtful follow-up questions".to_string(),
        ],
        weaknesses: vec![
            "Occasionally perfectionist".to_string(),
            "Sometimes overthinks small details".to_string(),
        ],
        typical_behaviors: vec![
            "Pauses to think, then gives a structured answer".to_string(),
            "Responds to NPC questions accurately and adds relevant detail".to_string(),
            "Asks for further explanation or deeper discussion on their own".to_string(),
            "Hedges carefully instead of guessing when unsure".to_string(),
        ],
        response_length: ResponseLength::Medium,
        engagement_level: EngagementLevel::High,
        question_frequency: QuestionFrequency::High,
    }
}

fn average() -> Persona {
    Persona {
        name: "Average student".to_string(),
        persona_type: PersonaType::Preset,
        background: "Typical undergraduate; passable fundamentals, unremarkable study habits."
            .to_string(),
        personality: "Easygoing, somewhat passive, occasionally distracted.".to_string(),
        goal: "Finish the assigned work and pass the assessment.".to_string(),
        knowledge_level: "Basic concepts are in place but some are shallowly understood."
            .to_string(),
        learning_style: "Follows along; needs prompting and hints to go deeper.".to_string(),
        interaction_style: "Participates normally but sometimes needs encouragement to speak up."
            .to_string(),
        strengths: vec![
            "Understands basic concepts and straightforward questions".to_string(),
            "Friendly and cooperative".to_string(),
            "Reaches correct answers when given a hint".to_string(),
        ],
        weaknesses: vec![
            "Struggles with complex questions".to_string(),
            "Explanations can be incomplete or unclear".to_string(),
            "Needs NPC guidance to go deeper".to_string(),
            "Attention drifts".to_string(),
        ],
        typical_behaviors: vec![
            "Answers are mostly right but often incomplete".to_string(),
            "Admits confusion or asks for a hint on hard questions".to_string(),
            "Sometimes replies quite briefly".to_string(),
            "Improves answers step by step under NPC guidance".to_string(),
        ],
        response_length: ResponseLength::Medium,
        engagement_level: EngagementLevel::Normal,
        question_frequency: QuestionFrequency::Normal,
    }
}

fn struggling() -> Persona {
    Persona {
        name: "Struggling student".to_string(),
        persona_type: PersonaType::Preset,
        background: "Weak fundamentals and low motivation; frequently finds the material hard."
            .to_string(),
        personality: "Introverted, low confidence, easily flustered.".to_string(),
        goal: "Hopes to keep up with the pace but often feels overwhelmed.".to_string(),
        knowledge_level: "Shaky fundamentals; concepts get mixed up.".to_string(),
        learning_style: "Passive; relies on the teacher's explanation, rarely thinks ahead."
            .to_string(),
        interaction_style: "Hesitant, unconfident answers that drift off topic.".to_string(),
        strengths: vec![
            "Sincere attitude and willing to learn".to_string(),
            "Makes progress when guided patiently".to_string(),
        ],
        weaknesses: vec![
            "Muddles basic concepts".to_string(),
            "Disorganized answers that miss the question".to_string(),
            "Cannot generalize from one example to another".to_string(),
            "Nerves cause underperformance".to_string(),
            "Hard to hold attention for long".to_string(),
        ],
        typical_behaviors: vec![
            "Hesitates and hedges with \"maybe\" or \"probably\"".to_string(),
            "Drifts away from the question being asked".to_string(),
            "Needs repeated guidance before catching the point".to_string(),
            "Sometimes answers wrongly or off topic".to_string(),
            "Accepts corrections but soon repeats similar mistakes".to_string(),
        ],
        response_length: ResponseLength::Short,
        engagement_level: EngagementLevel::Low,
        question_frequency: QuestionFrequency::Low,
    }
}
