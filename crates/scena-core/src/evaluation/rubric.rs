//! Fixed scoring rubric: 5 dimensions, 21 sub-dimensions, 100 points.

/// One leaf criterion and the prompt text the judge scores it against.
#[derive(Debug, Clone, Copy)]
pub struct SubDimension {
    pub name: &'static str,
    pub max_score: f64,
    pub criterion: &'static str,
}

/// One rubric dimension.
#[derive(Debug, Clone, Copy)]
pub struct Dimension {
    pub name: &'static str,
    pub max_score: f64,
    pub subs: &'static [SubDimension],
}

pub static RUBRIC: &[Dimension] = &[
    Dimension {
        name: "Goal attainment",
        max_score: 20.0,
        subs: &[
            SubDimension {
                name: "Knowledge coverage",
                max_score: 10.0,
                criterion: "Whether the knowledge points of the teaching material were sufficiently covered.",
            },
            SubDimension {
                name: "Competency coverage",
                max_score: 10.0,
                criterion: "Whether the student competency goals of the scenario were reached.",
            },
        ],
    },
    Dimension {
        name: "Process adherence",
        max_score: 20.0,
        subs: &[
            SubDimension {
                name: "Stage entry conditions",
                max_score: 4.0,
                criterion: "Whether preconditions were satisfied before entering the next stage.",
            },
            SubDimension {
                name: "In-stage ordering",
                max_score: 4.0,
                criterion: "Whether dialogue inside a stage unfolded in the expected order.",
            },
            SubDimension {
                name: "Global stage flow",
                max_score: 4.0,
                criterion: "Whether the overall scene progression followed the scripted design.",
            },
            SubDimension {
                name: "Stage exit checks",
                max_score: 4.0,
                criterion: "Whether the required content was completed before leaving a stage.",
            },
            SubDimension {
                name: "Non-linear jump handling",
                max_score: 4.0,
                criterion: "Whether out-of-order jumps were handled reasonably.",
            },
        ],
    },
    Dimension {
        name: "Interaction quality",
        max_score: 20.0,
        subs: &[
            SubDimension {
                name: "Persona voice fidelity",
                max_score: 4.0,
                criterion: "The NPC should mainly question, comment, and guide; the scripted counterpart should answer and narrate in its own role. Deduct for role reversal, such as the NPC supplying answers or the counterpart grading the NPC in an examiner's voice.",
            },
            SubDimension {
                name: "Naturalness",
                max_score: 4.0,
                criterion: "Whether the dialogue reads fluent and natural.",
            },
            SubDimension {
                name: "Context cohesion",
                max_score: 4.0,
                criterion: "Whether the dialogue stays coherent across turns.",
            },
            SubDimension {
                name: "Loop avoidance",
                max_score: 4.0,
                criterion: "Whether repetitive loops were avoided or escaped.",
            },
            SubDimension {
                name: "Reply length control",
                max_score: 4.0,
                criterion: "Whether single-turn replies stayed at an appropriate length: NPC within roughly 250 characters, counterpart around 50 to 100 words, slightly more when the situation demands. Deduct for overlong or curt replies.",
            },
        ],
    },
    Dimension {
        name: "Grounding & boundaries",
        max_score: 20.0,
        subs: &[
            SubDimension {
                name: "Factual accuracy",
                max_score: 4.0,
                criterion: "Whether stated facts are accurate.",
            },
            SubDimension {
                name: "Logical consistency",
                max_score: 4.0,
                criterion: "Whether the dialogue content is logically self-consistent.",
            },
            SubDimension {
                name: "Uncertainty admission",
                max_score: 4.0,
                criterion: "Whether uncertain content was acknowledged honestly.",
            },
            SubDimension {
                name: "Safety guardrails",
                max_score: 4.0,
                criterion: "Whether sensitive or inappropriate content was avoided.",
            },
            SubDimension {
                name: "Derail resistance",
                max_score: 4.0,
                criterion: "Whether the agent resisted the student's distractions and baiting.",
            },
        ],
    },
    Dimension {
        name: "Teaching technique",
        max_score: 20.0,
        subs: &[
            SubDimension {
                name: "Heuristic questioning",
                max_score: 5.0,
                criterion: "Whether questions were used well to prompt thinking.",
            },
            SubDimension {
                name: "Positive reinforcement",
                max_score: 5.0,
                criterion: "Whether appropriate encouragement and affirmation were given.",
            },
            SubDimension {
                name: "Corrective guidance",
                max_score: 5.0,
                criterion: "Whether mistakes were corrected in a suitable way.",
            },
            SubDimension {
                name: "Probing depth",
                max_score: 5.0,
                criterion: "Whether follow-up questions dug into the student's understanding.",
            },
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rubric_shape_is_five_by_twenty_one() {
        assert_eq!(RUBRIC.len(), 5);
        let subs: usize = RUBRIC.iter().map(|d| d.subs.len()).sum();
        assert_eq!(subs, 21);
    }

    #[test]
    fn dimension_maxes_sum_to_hundred() {
        for dim in RUBRIC {
            let sub_sum: f64 = dim.subs.iter().map(|s| s.max_score).sum();
            assert_eq!(sub_sum, dim.max_score, "dimension {}", dim.name);
        }
        let total: f64 = RUBRIC.iter().map(|d| d.max_score).sum();
        assert_eq!(total, 100.0);
    }
}
