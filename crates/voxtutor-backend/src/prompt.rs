//! Prompt text sent to the remote model, plus the user-facing fallback lines
//! shown when a request fails.

use voxtutor_core::{Language, LESSON_PARTS};

pub fn lesson(language: Language, unit_title: &str, topic_title: &str, part: u8) -> String {
    let part = part.clamp(1, LESSON_PARTS);
    format!(
        "You are a professional chemistry teacher for second-year secondary students.\n\
         Language: {lang}.\n\
         Curriculum: the official Egyptian curriculum.\n\
         Unit: {unit_title}\n\
         Topic: {topic_title}\n\
         This is part {part} of {LESSON_PARTS}.\n\
         \n\
         Strict content rules:\n\
         1. Use only the standard chemical notation found in the textbook (H2O, NaCl, mol).\n\
         2. Never use asterisks, hash marks, dollar signs or any markdown formatting.\n\
         3. Keep the text clean and clear, as if taken from the pages of the textbook.\n\
         4. Explain worked examples step by step and simply.\n\
         5. Keep a calm and scholarly tone.",
        lang = language.display_name(),
    )
}

pub fn diagram_image(topic_title: &str) -> String {
    format!(
        "A clear, educational scientific diagram for a 2nd secondary chemistry student about \
         the topic: \"{topic_title}\". The diagram should be professional, clean, and focus on \
         the chemical structures, atomic models, or lab setups relevant to this topic. Use white \
         background and clear labels."
    )
}

pub fn diagram_explanation(language: Language, topic_title: &str) -> String {
    format!(
        "As a chemistry teacher, comment on the illustration for the topic: {topic_title}.\n\
         Language: {lang}.\n\
         Explain to the student what they see in the diagram and how it relates to the \
         scientific concepts in their course, in a calm and encouraging style.\n\
         Avoid distracting symbols such as asterisks or hash marks.",
        lang = language.display_name(),
    )
}

pub fn test(language: Language, unit_title: &str, topic_title: &str) -> String {
    format!(
        "As a chemistry teacher, write a comprehensive and varied test for second-year \
         secondary students on the topic: {topic_title} in the unit: {unit_title}.\n\
         Language: {lang}.\n\
         \n\
         The test must include:\n\
         1. Multiple choice questions.\n\
         2. True or false questions with justification.\n\
         3. Explanation questions.\n\
         4. Critical thinking questions.\n\
         \n\
         Rules:\n\
         - Use correct chemical notation only.\n\
         - Never use distracting symbols such as asterisks or dollar signs.\n\
         - Keep the language encouraging and calm.\n\
         - Do not give the answers up front; ask the student to think.",
        lang = language.display_name(),
    )
}

/// Wraps text to be read aloud with the narration style instruction.
pub fn speech(language: Language, text: &str) -> String {
    match language {
        Language::Arabic => format!(
            "تحدثي بصوت أنثوي، بهدوء شديد وببطء ووقار كمعلمة تشرح في الفصل، مع إعطاء فواصل قصيرة بين الجمل: {text}"
        ),
        Language::English => format!(
            "Speak in a calm, female voice, slowly and professionally like a teacher in a \
             classroom, with short pauses between sentences: {text}"
        ),
    }
}

pub fn live_system_instruction(language: Language) -> String {
    format!(
        "You are a very patient and calm chemistry teacher.\n\
         Speak slowly and very clearly in this live session.\n\
         Language: {lang}.\n\
         Use only correct scientific notation and avoid filler or distracting symbols.",
        lang = language.display_name(),
    )
}

/// Spoken before a generated test.
pub fn test_intro(language: Language) -> &'static str {
    match language {
        Language::Arabic => "رائع! إليك الاختبار الشامل. خذ وقتك في التفكير والإجابة بهدوء.",
        Language::English => {
            "Great! Here is the comprehensive test. Take your time to think and answer calmly."
        }
    }
}

// ── Fallback lines ────────────────────────────────────────────

pub fn lesson_empty(language: Language) -> &'static str {
    match language {
        Language::Arabic => "عذراً، لم أتمكن من توليد الشرح.",
        Language::English => "Sorry, I could not generate the explanation.",
    }
}

pub fn lesson_failed(language: Language) -> &'static str {
    match language {
        Language::Arabic => "خطأ في الاتصال بالمعلمة.",
        Language::English => "Could not reach the teacher.",
    }
}

pub fn test_empty(language: Language) -> &'static str {
    match language {
        Language::Arabic => "عذراً، لم أتمكن من إنشاء الاختبار.",
        Language::English => "Sorry, I could not create the test.",
    }
}

pub fn test_failed(language: Language) -> &'static str {
    match language {
        Language::Arabic => "حدث خطأ أثناء محاولة إنشاء الاختبار.",
        Language::English => "An error occurred while creating the test.",
    }
}
