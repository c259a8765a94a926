//! 固定话术目录：问候、结束语、无响应提示与二阶段定向提问
//!
//! 按 {动作类别 × 语言 × 共情等级} 组织的数据表。动作匹配用类别短语的
//! 子串包含，匹配不到落到 default；共情等级缺省落到 medium。

use serde::Deserialize;

/// 支持的对话语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Fr,
}

impl Language {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            "fr" => Some(Self::Fr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
            Self::Fr => "fr",
        }
    }
}

/// 共情等级：low 直接、medium 平衡、high 安抚
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Empathy {
    Low,
    Medium,
    High,
}

impl Empathy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// 单条回复允许的最大句数
    pub fn max_sentences(&self) -> usize {
        match self {
            Self::High => 4,
            _ => 2,
        }
    }
}

/// 动作类别短语，用于把决策的动作描述映射到结束语
const GUIDE_KEY: &str = "Guide the victim to walk to the safe zone";
const ABANDON_KEY: &str = "Abandon immediate evacuation and maintain safety";
const CALM_KEY: &str = "Talk to the victim to calm them down";

/// 话术目录：固定语言与共情等级下的全部固定文本
#[derive(Debug, Clone, Copy)]
pub struct MessageCatalog {
    pub language: Language,
    pub empathy: Empathy,
}

impl MessageCatalog {
    pub fn new(language: Language, empathy: Empathy) -> Self {
        Self { language, empathy }
    }

    /// 一阶段开场问候
    pub fn greeting(&self) -> &'static str {
        use Empathy::*;
        use Language::*;
        match (self.language, self.empathy) {
            (En, Low) => "Hello. Are you injured?",
            (En, Medium) => "Hello. I am a rescue robot here to help you. Are you injured?",
            (En, High) => "Hello, I'm a rescue robot and I'm here to help you. Are you injured or in pain? Please tell me what happened.",
            (Es, Low) => "Hola. Está herido?",
            (Es, Medium) => "Hola. Soy un robot de rescate y estoy aquí para ayudarle. Está herido?",
            (Es, High) => "Hola, soy un robot de rescate y estoy aquí para ayudarle. Está herido o siente dolor? Por favor, dígame qué pasó.",
            (Fr, Low) => "Bonjour. Êtes-vous blessé?",
            (Fr, Medium) => "Bonjour. Je suis un robot de sauvetage et je suis là pour vous aider. Êtes-vous blessé ?",
            (Fr, High) => "Bonjour, je suis un robot de sauvetage et je suis là pour vous aider. Êtes-vous blessé ou souffrez-vous? Veuillez me dire ce qui s'est passé.",
        }
    }

    /// 按动作描述选结束语；子串匹配类别短语，无匹配用 default
    pub fn final_message_for_action(&self, action_label: &str) -> &'static str {
        if action_label.contains(GUIDE_KEY) {
            self.guide_message()
        } else if action_label.contains(ABANDON_KEY) {
            self.abandon_message()
        } else if action_label.contains(CALM_KEY) {
            self.calm_message()
        } else {
            self.default_final_message()
        }
    }

    /// 评估完成时按行动能力选结束语
    pub fn completion_message(&self, can_walk: bool, is_stuck: bool) -> &'static str {
        if can_walk && !is_stuck {
            self.guide_message()
        } else {
            self.default_final_message()
        }
    }

    fn guide_message(&self) -> &'static str {
        use Empathy::*;
        use Language::*;
        match (self.language, self.empathy) {
            (En, Low) => "Assessment complete. Follow me to safety.",
            (En, Medium) => "Assessment complete. You can walk, so please follow me to safety.",
            (En, High) => "You've been very brave. I've completed my assessment and you can walk safely. Please follow me to the evacuation point. I'll help you the entire way.",
            (Es, Low) => "Evaluación completa. Sígame a un lugar seguro.",
            (Es, Medium) => "Evaluación completa. Puede caminar, por favor, sígame a un lugar seguro.",
            (Es, High) => "Ha sido muy valiente. He completado mi evaluación y puede caminar sin peligro. Por favor, sígame hasta el punto de evacuación. Le ayudaré durante todo el camino.",
            (Fr, Low) => "Évaluation terminée. Suivez-moi vers la sécurité.",
            (Fr, Medium) => "Évaluation terminée. Vous pouvez marcher, veuillez donc me suivre vers la sécurité.",
            (Fr, High) => "Vous avez été très courageux(se). J'ai terminé mon évaluation et vous pouvez marcher en toute sécurité. Veuillez me suivre jusqu'au point d'évacuation. Je vais vous aider tout le long du chemin.",
        }
    }

    fn abandon_message(&self) -> &'static str {
        use Empathy::*;
        use Language::*;
        match (self.language, self.empathy) {
            (En, Low) => "Immediate danger detected. Stay where you are. Emergency services coming.",
            (En, Medium) => "There's immediate danger. Please stay in place. Help is coming.",
            (En, High) => "I need to prioritize our safety right now. Please stay exactly where you are. Emergency responders are on their way to help us both.",
            (Es, Low) => "Peligro inmediato detectado. Quédese donde está. Servicios de emergencia en camino.",
            (Es, Medium) => "Hay peligro inmediato. Por favor, permanezca en su sitio. La ayuda viene en camino.",
            (Es, High) => "Debo priorizar nuestra seguridad en este momento. Por favor, quédese exactamente donde está. Los equipos de emergencia están en camino para ayudarnos a ambos.",
            (Fr, Low) => "Danger immédiat détecté. Restez où vous êtes. Les services d'urgence arrivent.",
            (Fr, Medium) => "Il y a un danger immédiat. Veuillez rester sur place. L'aide arrive.",
            (Fr, High) => "Je dois donner la priorité à notre sécurité pour le moment. Veuillez rester exactement où vous êtes. Les équipes d'urgence sont en route pour nous aider tous les deux.",
        }
    }

    fn calm_message(&self) -> &'static str {
        use Empathy::*;
        use Language::*;
        match (self.language, self.empathy) {
            (En, Low) => "Stay calm. Help is on the way.",
            (En, Medium) => "Please try to stay calm. Help is on the way and you're safe.",
            (En, High) => "I know this is frightening, but you're doing great. Help is coming and you're safe with me. Just stay calm and breathe slowly.",
            (Es, Low) => "Mantenga la calma. La ayuda está en camino.",
            (Es, Medium) => "Por favor, intente mantener la calma. La ayuda está en camino y está seguro(a).",
            (Es, High) => "Sé que esto da miedo, pero lo está haciendo muy bien. La ayuda viene en camino y está seguro(a) conmigo. Simplemente mantenga la calma y respire lentamente.",
            (Fr, Low) => "Restez calme. L'aide est en route.",
            (Fr, Medium) => "Veuillez essayer de rester calme. L'aide est en route et vous êtes en sécurité.",
            (Fr, High) => "Je sais que c'est effrayant, mais vous vous en sortez très bien. L'aide arrive et vous êtes en sécurité avec moi. Restez juste calme et respirez lentement.",
        }
    }

    fn default_final_message(&self) -> &'static str {
        use Empathy::*;
        use Language::*;
        match (self.language, self.empathy) {
            (En, Low) => "Assessment complete. Emergency services dispatched. Stay where you are.",
            (En, Medium) => "Assessment complete. Emergency services are on the way. Please remain in place.",
            (En, High) => "You've been very brave. My assessment is complete, and I've called for specialized help. Please stay where you are. A rescue team is on the way to your location.",
            (Es, Low) => "Evaluación completa. Servicios de emergencia enviados. Quédese donde está.",
            (Es, Medium) => "Evaluación completa. Los servicios de emergencia están en camino. Por favor, permanezca en su sitio.",
            (Es, High) => "Ha sido muy valiente. Mi evaluación ha finalizado, y he llamado a ayuda especializada. Por favor, quédese donde está. Un equipo de rescate ya está en camino hacia su ubicación.",
            (Fr, Low) => "Évaluation terminée. Services d'urgence dépêchés. Restez où vous êtes.",
            (Fr, Medium) => "Évaluation terminée. Les services d'urgence sont en route. Veuillez rester sur place.",
            (Fr, High) => "Vous avez été très courageux(se). Mon évaluation est terminée et j'ai appelé de l'aide spécialisée. Veuillez rester où vous êtes. Une équipe de sauvetage est en route vers votre emplacement.",
        }
    }

    /// 受困者沉默时的重问话术
    pub fn no_response(&self) -> &'static str {
        use Empathy::*;
        use Language::*;
        match (self.language, self.empathy) {
            (En, Low) => "Please respond to my question.",
            (En, Medium) => "I didn't catch that. Could you please speak again?",
            (En, High) => "I didn't catch what you said. Please don't worry, I'm here to help. Could you speak again?",
            (Es, Low) => "Por favor, responda a mi pregunta.",
            (Es, Medium) => "No le he entendido. ¿Podría hablar de nuevo, por favor?",
            (Es, High) => "No he captado lo que ha dicho. Por favor, no se preocupe, estoy aquí para ayudar. ¿Podría hablar de nuevo?",
            (Fr, Low) => "Veuillez répondre à ma question.",
            (Fr, Medium) => "Je n'ai pas compris cela. Pourriez-vous répéter s'il vous plaît?",
            (Fr, High) => "Je n'ai pas entendu ce que vous avez dit. Ne vous inquiétez pas, je suis là pour vous aider. Pourriez-vous parler à nouveau ?",
        }
    }

    /// 二阶段开场
    pub fn comfort_opener(&self) -> &'static str {
        match self.language {
            Language::Fr => "Je suis là avec vous. Comment vous sentez-vous ? Y a-t-il quelque chose que je devrais savoir pour que vous soyez plus à l'aise ?",
            Language::Es => "Estoy aquí contigo ahora. Cómo te sientes? Hay algo que deba saber para que estés cómoda?",
            Language::En => "I'm here with you now. How are you feeling? Is there anything I should know to help keep you comfortable?",
        }
    }

    /// LLM 安抚失败时的兜底话术
    pub fn comfort_fallback(&self, high_distress: bool) -> &'static str {
        match (self.language, high_distress) {
            (Language::Es, true) => "Entiendo que estás pasando por un momento difícil. La ayuda está en camino. ¿Tienes alguna condición médica o necesidad que deba saber?",
            (Language::Es, false) => "Gracias por mantener la calma. Su información ha sido enviada al equipo de rescate. ¿Tiene alguna necesidad médica especial, como medicamentos o afecciones que deba tener en cuenta?",
            (Language::Fr, true) => "Je comprends que vous traversez une période difficile. De l'aide arrive. Avez-vous des problèmes de santé ou des besoins particuliers dont je devrais être informé(e) ?",
            (Language::Fr, false) => "Merci de garder votre calme. Vos informations ont été transmises à l'équipe de secours. Avez-vous des besoins médicaux particuliers, comme des médicaments ou des problèmes de santé dont je devrais être informé(e) ?",
            (Language::En, true) => "I understand you're going through a difficult time. Help is on the way. Do you have any medical conditions or needs I should know about?",
            (Language::En, false) => "Thank you for staying calm. Your information has been sent to the rescue team. Do you have any special medical needs, such as medications or conditions I should be aware of?",
        }
    }

    /// 二阶段定向提问；未建表的字段用默认追问
    pub fn comfort_question(&self, field: &str) -> &'static str {
        use Language::*;
        match (self.language, field) {
            (En, "emergency_medication") => "Do you need any medications right now? Like insulin, an inhaler, or anything else?",
            (En, "pregnant") => "I need to know - are you pregnant? This helps me know how best to help you.",
            (En, "elderly") => "Can you tell me your age? This helps us plan the best way to get you out.",
            (En, "mobility_impairment") => "Are you able to walk on your own, or do you have any mobility issues?",
            (En, "regular_medication") => "Are you on any regular medications I should know about?",
            (En, "allergies") => "Do you have any allergies I should be aware of?",
            (En, "mental_health_conditions") => "Is there anything about your health or any conditions that might affect how you're feeling right now?",
            (En, "other_conditions") => "Is there anything else about your health or situation I should know?",
            (Fr, "emergency_medication") => "Avez-vous besoin de médicaments tout de suite ? Comme de l'insuline, un inhalateur, ou autre chose ?",
            (Fr, "pregnant") => "J'ai besoin de savoir : êtes-vous enceinte ? Cela m'aide à savoir comment vous aider au mieux.",
            (Fr, "elderly") => "Pouvez-vous me dire votre âge ? Cela nous aide à planifier la meilleure façon de vous faire sortir.",
            (Fr, "mobility_impairment") => "Êtes-vous capable de marcher seule, ou avez-vous des problèmes de mobilité ?",
            (Fr, "regular_medication") => "Prenez-vous des médicaments réguliers dont je devrais être au courant ?",
            (Fr, "allergies") => "Avez-vous des allergies dont je devrais être informé(e) ?",
            (Fr, "mental_health_conditions") => "Y a-t-il quelque chose concernant votre santé ou toute condition qui pourrait affecter votre état actuel ?",
            (Fr, "other_conditions") => "Y a-t-il autre chose concernant votre santé ou votre situation que je devrais savoir ?",
            (Es, "emergency_medication") => "¿Necesita algún medicamento ahora mismo? ¿Como insulina, un inhalador o algo más?",
            (Es, "pregnant") => "Necesito saber: ¿está embarazada? Esto me ayuda a saber cómo asistirla mejor.",
            (Es, "elderly") => "¿Puede decirme su edad? Esto nos ayuda a planificar la mejor manera de sacarla.",
            (Es, "mobility_impairment") => "¿Puede caminar por sí misma o tiene algún problema de movilidad?",
            (Es, "regular_medication") => "¿Toma algún medicamento regular que deba saber?",
            (Es, "allergies") => "¿Tiene alguna alergia que deba tener en cuenta?",
            (Es, "mental_health_conditions") => "¿Hay algo sobre su salud o alguna condición que pueda afectar cómo se siente en este momento?",
            (Es, "other_conditions") => "¿Hay algo más sobre su salud o situación que deba saber?",
            (En, _) => "Is there anything else I should know?",
            (Fr, _) => "Y a-t-il autre chose que je devrais savoir ?",
            (Es, _) => "¿Hay algo más que debería saber?",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_and_empathy_parse() {
        assert_eq!(Language::parse("EN"), Some(Language::En));
        assert_eq!(Language::parse("de"), None);
        assert_eq!(Empathy::parse("High"), Some(Empathy::High));
        assert_eq!(Empathy::parse("extreme"), None);
    }

    #[test]
    fn test_action_substring_match() {
        let catalog = MessageCatalog::new(Language::En, Empathy::Low);
        assert_eq!(
            catalog.final_message_for_action(
                "Next: Guide the victim to walk to the safe zone carefully"
            ),
            "Assessment complete. Follow me to safety."
        );
        assert_eq!(
            catalog.final_message_for_action("something unrecognized"),
            "Assessment complete. Emergency services dispatched. Stay where you are."
        );
    }

    #[test]
    fn test_completion_message_by_mobility() {
        let catalog = MessageCatalog::new(Language::En, Empathy::Medium);
        assert!(catalog.completion_message(true, false).contains("follow me"));
        assert!(catalog
            .completion_message(false, true)
            .contains("remain in place"));
    }

    #[test]
    fn test_comfort_question_fallback() {
        let catalog = MessageCatalog::new(Language::Fr, Empathy::Medium);
        assert!(catalog.comfort_question("allergies").contains("allergies"));
        assert_eq!(
            catalog.comfort_question("medical_conditions"),
            "Y a-t-il autre chose que je devrais savoir ?"
        );
    }

    #[test]
    fn test_max_sentences_by_empathy() {
        assert_eq!(Empathy::Low.max_sentences(), 2);
        assert_eq!(Empathy::Medium.max_sentences(), 2);
        assert_eq!(Empathy::High.max_sentences(), 4);
    }
}
