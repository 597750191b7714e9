//! System prompt assembly from the event profile and retrieved context.

use std::fmt::Write as _;

use chrono::NaiveDate;

use super::conversation::ConversationState;
use crate::core::config::defaults::MAX_PROMPT_CONTEXT;
use crate::event::EventProfile;
use crate::knowledge::RetrievedChunk;

pub struct PromptAssembler {
    profile: EventProfile,
    context_limit: usize,
}

impl PromptAssembler {
    pub fn new(profile: EventProfile, context_limit: usize) -> Self {
        Self {
            profile,
            context_limit: context_limit.clamp(1, MAX_PROMPT_CONTEXT),
        }
    }

    /// Builds the final system prompt. Pure: the same inputs always give
    /// the same text. At most `context_limit` entries of `context` are used.
    pub fn assemble(
        &self,
        context: &[RetrievedChunk],
        state: &ConversationState,
        today: NaiveDate,
    ) -> String {
        self.assemble_with_followups(context, state, today, &[])
    }

    /// Like [`assemble`](Self::assemble), also asking the model not to
    /// repeat follow-up questions the widget already showed.
    pub fn assemble_with_followups(
        &self,
        context: &[RetrievedChunk],
        state: &ConversationState,
        today: NaiveDate,
        last_followups: &[String],
    ) -> String {
        let mut prompt = String::with_capacity(4096);

        self.write_identity(&mut prompt);
        self.write_event_facts(&mut prompt, today);
        self.write_rules(&mut prompt);

        if state.should_mention_tickets() {
            prompt.push_str(
                "\nJEGY-EMLÉKEZTETŐ: az elmúlt válaszokban nem esett szó a jegyekről. \
                 Ha a téma engedi, a válasz végén röviden említsd meg a jegyvásárlási lehetőséget.\n",
            );
        }

        let followups: Vec<&str> = last_followups
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .collect();
        if !followups.is_empty() {
            let _ = writeln!(
                prompt,
                "\nEzeket a követő kérdéseket már feltetted, ne ismételd őket: {}",
                followups.join(" | ")
            );
        }

        self.write_context(&mut prompt, context);
        prompt
    }

    fn write_identity(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "Te az {} konferencia barátságos, lelkes asszisztense vagy. \
             Magyarul, tegeződve válaszolsz, rövid és pontos mondatokban.",
            self.profile.name
        );
    }

    fn write_event_facts(&self, out: &mut String, today: NaiveDate) {
        let profile = &self.profile;

        let _ = writeln!(out, "\nALAPADATOK:");
        let _ = writeln!(out, "- Időpont: {}", profile.date.format("%Y-%m-%d"));
        let _ = writeln!(out, "- Helyszín: {}, {}", profile.venue, profile.city);
        if !profile.organizers.is_empty() {
            let _ = writeln!(out, "- Szervezők: {}", profile.organizers.join(" & "));
        }
        let _ = writeln!(out, "- Weboldal: {}", profile.site_url);
        let _ = writeln!(out, "- Mai dátum: {}", today.format("%Y-%m-%d"));

        if let Some(phase) = profile.pricing_for(today) {
            let _ = writeln!(
                out,
                "\nJEGYÁRAK ({}, {} - {}):",
                phase.label,
                phase.valid_from.format("%Y-%m-%d"),
                phase.valid_until.format("%Y-%m-%d")
            );
            for tier in &phase.tiers {
                let _ = write!(out, "- {}: {} Ft", tier.name, format_huf(tier.price_huf));
                if !tier.perks.is_empty() {
                    let _ = write!(out, " ({})", tier.perks);
                }
                out.push('\n');
            }
        }
        for note in &profile.ticket_notes {
            let _ = writeln!(out, "- {}", note);
        }

        if !profile.schedule.is_empty() {
            let _ = writeln!(out, "\nPROGRAM:");
            for entry in &profile.schedule {
                let _ = writeln!(out, "- {}: {}", entry.slot, entry.title);
            }
        }

        if !profile.speakers.is_empty() {
            let _ = writeln!(out, "\nELŐADÓK:");
            for speaker in &profile.speakers {
                let _ = write!(out, "- {}", speaker.name);
                if let Some(company) = &speaker.company {
                    let _ = write!(out, " ({})", company);
                }
                if let Some(talk) = &speaker.talk {
                    let _ = write!(out, ": {}", talk);
                }
                out.push('\n');
            }
        }

        if !profile.workshops.is_empty() {
            let _ = writeln!(out, "\nWORKSHOPOK (délután, párhuzamosan):");
            for workshop in &profile.workshops {
                match &workshop.host {
                    Some(host) => {
                        let _ = writeln!(out, "- {} ({})", workshop.title, host);
                    }
                    None => {
                        let _ = writeln!(out, "- {}", workshop.title);
                    }
                }
            }
        }

        if !profile.logistics.is_empty() {
            let _ = writeln!(out, "\nGYAKORLATI INFÓK:");
            for line in &profile.logistics {
                let _ = writeln!(out, "- {}", line);
            }
        }
    }

    fn write_rules(&self, out: &mut String) {
        out.push_str(
            "\nSZABÁLYOK:\n\
             - Csak a fenti alapadatokra és a lenti kontextusra támaszkodj. Ne találj ki tényeket, \
             árakat, időpontokat vagy előadókat.\n\
             - Ha valamit nem tudsz biztosan, mondd meg őszintén, és ajánld a weboldalt vagy a szervezőket.\n\
             - Legfeljebb 3-4 mondatban válaszolj, használhatsz 1-2 emojit.\n\
             - Ne használj markdown címsorokat vagy táblázatokat.\n\
             - Minden válasz végén tegyél fel pontosan egy rövid, releváns követő kérdést.\n",
        );
    }

    fn write_context(&self, out: &mut String, context: &[RetrievedChunk]) {
        if context.is_empty() {
            out.push_str("\nKONTEXTUS: nincs találat a tudásbázisban, csak az alapadatokat használd.\n");
            return;
        }

        out.push_str("\nKONTEXTUS A TUDÁSBÁZISBÓL:\n");
        for (index, chunk) in context.iter().take(self.context_limit).enumerate() {
            let _ = write!(out, "[{}] {}", index + 1, chunk.content.trim());
            if !chunk.tags.is_empty() {
                let _ = write!(out, " (címkék: {})", chunk.tags.join(", "));
            }
            out.push('\n');
        }
    }
}

/// 129000 -> "129.000"
fn format_huf(amount: u32) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::chat::conversation::ConversationTurn;

    fn assembler() -> PromptAssembler {
        PromptAssembler::new(EventProfile::embedded().unwrap(), 5)
    }

    fn chunk(i: usize) -> RetrievedChunk {
        RetrievedChunk {
            id: format!("c{i}"),
            content: format!("tény {i}"),
            tags: vec!["program".to_string()],
            similarity: Some(0.9),
            metadata: Value::Null,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn formats_prices_with_dot_grouping() {
        assert_eq!(format_huf(89000), "89.000");
        assert_eq!(format_huf(199000), "199.000");
        assert_eq!(format_huf(1_250_000), "1.250.000");
        assert_eq!(format_huf(900), "900");
    }

    #[test]
    fn never_embeds_more_than_five_entries() {
        let context: Vec<RetrievedChunk> = (1..=8).map(chunk).collect();
        let prompt = assembler().assemble(
            &context,
            &ConversationState::default(),
            date(2025, 10, 19),
        );

        assert!(prompt.contains("[5] tény 5 (címkék: program)"));
        assert!(!prompt.contains("[6]"));
        assert!(!prompt.contains("tény 6"));
    }

    #[test]
    fn context_limit_is_clamped() {
        let assembler = PromptAssembler::new(EventProfile::embedded().unwrap(), 50);
        let context: Vec<RetrievedChunk> = (1..=8).map(chunk).collect();
        let prompt = assembler.assemble(&context, &ConversationState::default(), date(2025, 10, 19));

        assert!(!prompt.contains("[6]"));
    }

    #[test]
    fn pricing_section_follows_today() {
        let assembler = assembler();
        let state = ConversationState::default();

        let early = assembler.assemble(&[], &state, date(2025, 9, 10));
        assert!(early.contains("Early Bird: 89.000 Ft"));

        let standard = assembler.assemble(&[], &state, date(2025, 10, 19));
        assert!(standard.contains("Standard: 129.000 Ft"));
        assert!(!standard.contains("Early Bird: 89.000 Ft"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let assembler = assembler();
        let context: Vec<RetrievedChunk> = (1..=3).map(chunk).collect();
        let state = ConversationState::default();
        let today = date(2025, 10, 19);

        assert_eq!(
            assembler.assemble(&context, &state, today),
            assembler.assemble(&context, &state, today)
        );
    }

    #[test]
    fn empty_context_is_stated() {
        let prompt = assembler().assemble(&[], &ConversationState::default(), date(2025, 10, 19));
        assert!(prompt.contains("nincs találat"));
        assert!(prompt.contains("Ne találj ki tényeket"));
        assert!(prompt.contains("pontosan egy"));
    }

    #[test]
    fn previous_followups_are_listed() {
        let prompt = assembler().assemble_with_followups(
            &[],
            &ConversationState::default(),
            date(2025, 10, 19),
            &["Melyik workshop érdekel?".to_string(), "  ".to_string()],
        );
        assert!(prompt.contains("ne ismételd őket: Melyik workshop érdekel?\n"));
    }

    #[test]
    fn ticket_reminder_follows_conversation_state() {
        let assembler = assembler();
        let today = date(2025, 10, 19);

        let quiet = ConversationState::from_history(&[
            ConversationTurn::bot("Délelőtt előadások."),
            ConversationTurn::bot("Bálna mélygarázs."),
            ConversationTurn::bot("Fakanál Étterem."),
        ]);
        assert!(assembler.assemble(&[], &quiet, today).contains("JEGY-EMLÉKEZTETŐ"));

        let fresh = ConversationState::default();
        assert!(!assembler.assemble(&[], &fresh, today).contains("JEGY-EMLÉKEZTETŐ"));
    }
}
