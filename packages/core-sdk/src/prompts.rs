use serde::{Deserialize, Serialize};

/**
 * \brief 用户可触发的文本处理动作。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Ask,
    Proofread,
    TranslateEn,
    TranslateTo,
    Summarize,
    RewriteStyle,
}

impl Action {
    /**
     * \brief 从标签字符串解析动作；未知标签回落到 Proofread（文档化的缺省，
     *        不是错误）。
     */
    pub fn from_tag(tag: &str) -> Action {
        match tag {
            "ask" => Action::Ask,
            "proofread" => Action::Proofread,
            "translate_en" => Action::TranslateEn,
            "translate_to" => Action::TranslateTo,
            "summarize" => Action::Summarize,
            "rewrite_style" => Action::RewriteStyle,
            _ => Action::Proofread,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Action::Ask => "ask",
            Action::Proofread => "proofread",
            Action::TranslateEn => "translate_en",
            Action::TranslateTo => "translate_to",
            Action::Summarize => "summarize",
            Action::RewriteStyle => "rewrite_style",
        }
    }
}

/** \brief 附带图片时追加的指令，告知模型先转写图中文字再执行任务。 */
const VISION_HINT: &str = " If an image is provided, first transcribe the text in the image accurately, then perform the task. Return ONLY the final result.";

/**
 * \brief 返回动作对应的系统指令。
 * \details 指令文本会原样发给模型，约束其输出格式（如"仅返回翻译"），
 *          修改措辞会改变行为，勿随意调整。
 */
pub fn system_prompt_for(action: Action, has_image: bool) -> String {
    let base = match action {
        Action::Ask => "Answer the user's question briefly and directly. Provide only the answer, no preamble.",
        Action::Proofread => "You are a meticulous copy editor. Fix grammar, punctuation, clarity, and tone while preserving meaning.",
        Action::TranslateEn => "Translate the user's text to natural, idiomatic English. Provide only the translation, no other explanations.",
        Action::TranslateTo => "Translate the user's text into the target language. Provide only the translation without any explanation.",
        Action::Summarize => "Summarize the user's text concisely. Capture key points and any actionable items.",
        Action::RewriteStyle => "Rewrite the user's text in the requested style. Honor the style faithfully while preserving meaning. USE THE ORIGINAL LANGUAGE!",
    };
    if has_image {
        format!("{}{}", base, VISION_HINT)
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Action; 6] = [
        Action::Ask,
        Action::Proofread,
        Action::TranslateEn,
        Action::TranslateTo,
        Action::Summarize,
        Action::RewriteStyle,
    ];

    #[test]
    fn test_prompts_non_empty_for_all_actions() {
        for action in ALL {
            for has_image in [false, true] {
                assert!(
                    !system_prompt_for(action, has_image).is_empty(),
                    "empty prompt for {:?}",
                    action
                );
            }
        }
    }

    #[test]
    fn test_vision_hint_present_iff_image() {
        for action in ALL {
            assert!(system_prompt_for(action, true).contains("transcribe the text in the image"));
            assert!(!system_prompt_for(action, false).contains("transcribe"));
        }
    }

    #[test]
    fn test_vision_hint_is_a_suffix() {
        for action in ALL {
            let plain = system_prompt_for(action, false);
            let with_image = system_prompt_for(action, true);
            assert!(with_image.starts_with(&plain));
            assert!(with_image.len() > plain.len());
        }
    }

    #[test]
    fn test_unknown_tag_falls_back_to_proofread() {
        assert_eq!(Action::from_tag("no_such_action"), Action::Proofread);
        assert_eq!(
            system_prompt_for(Action::from_tag("no_such_action"), false),
            system_prompt_for(Action::Proofread, false)
        );
    }

    #[test]
    fn test_tag_round_trip() {
        for action in ALL {
            assert_eq!(Action::from_tag(action.tag()), action);
        }
    }

    #[test]
    fn test_serde_tags_are_snake_case() {
        let v = serde_json::to_value(Action::RewriteStyle).expect("serialize");
        assert_eq!(v, serde_json::json!("rewrite_style"));
        let back: Action = serde_json::from_value(serde_json::json!("translate_en")).expect("de");
        assert_eq!(back, Action::TranslateEn);
    }

    #[test]
    fn test_translation_prompts_demand_translation_only() {
        assert!(system_prompt_for(Action::TranslateEn, false)
            .contains("Provide only the translation"));
        assert!(system_prompt_for(Action::TranslateTo, false)
            .contains("without any explanation"));
    }
}
