// Fixed translation prompt. Each source sentence is templated on its own so
// the engine translates sentence-by-sentence.

pub const SOURCE_LANG: &str = "Chinese";
pub const TARGET_LANG: &str = "Korean";

pub fn build_prompt(sentence: &str) -> String {
    format!(
        "<|im_start|>system\n\
         You are a veteran translator who translates {src} into {tgt}. \
         Translate naturally only using {tgt}.<|im_end|>\n\
         <|im_start|>user\n\
         Translate the following text from {src} to {tgt}\n\
         {src}: {sentence}\n\
         {tgt}:<|im_end|>\n\
         <|im_start|>assistant\n",
        src = SOURCE_LANG,
        tgt = TARGET_LANG,
    )
}

pub fn build_prompts(sentences: &[String]) -> Vec<String> {
    sentences.iter().map(|s| build_prompt(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_the_sentence_once() {
        let prompt = build_prompt("今天天气很好。");
        assert_eq!(prompt.matches("今天天气很好。").count(), 1);
        assert!(prompt.contains("Chinese: 今天天气很好。"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn one_prompt_per_sentence_in_order() {
        let sentences = vec!["第一句。".to_string(), "第二句。".to_string()];
        let prompts = build_prompts(&sentences);
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("第一句。"));
        assert!(prompts[1].contains("第二句。"));
    }
}
