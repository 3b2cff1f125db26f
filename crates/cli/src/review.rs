use async_trait::async_trait;
use engine_processing::lookup::{ReviewDecision, ReviewPolicy};
use model::{records::record::Record, transform::lookup::LookupField};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::Mutex,
};
use tracing::warn;

/// Asks the operator on the terminal after each lookup field is resolved.
pub struct TerminalReview<R = BufReader<Stdin>> {
    input: Mutex<Lines<R>>,
}

impl TerminalReview {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> TerminalReview<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            input: Mutex::new(reader.lines()),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ReviewPolicy for TerminalReview<R> {
    async fn review_lookup(
        &self,
        field: &LookupField,
        resolved: usize,
        sample: &[Record],
    ) -> ReviewDecision {
        println!(
            "\n{} -> {}.{}: {resolved} value(s) resolved",
            field.column_name, field.related_entity, field.match_field
        );
        for record in sample {
            println!("  {}", record.get_value(&field.column_name).comparable_text());
        }
        println!("[Enter] accept, [c] cancel, or type another match field:");

        let mut input = self.input.lock().await;
        match input.next_line().await {
            Ok(Some(line)) => parse_answer(&line),
            Ok(None) => ReviewDecision::Accept,
            Err(e) => {
                warn!(error = %e, "Could not read review answer, cancelling");
                ReviewDecision::Cancel
            }
        }
    }
}

fn parse_answer(line: &str) -> ReviewDecision {
    match line.trim() {
        "" | "y" | "Y" | "yes" => ReviewDecision::Accept,
        "c" | "C" | "cancel" => ReviewDecision::Cancel,
        field => ReviewDecision::Reselect(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("\n"), ReviewDecision::Accept);
        assert_eq!(parse_answer(" c "), ReviewDecision::Cancel);
        assert_eq!(
            parse_answer("AccountNumber"),
            ReviewDecision::Reselect("AccountNumber".into())
        );
    }

    #[tokio::test]
    async fn test_reads_one_answer_per_checkpoint() {
        let review = TerminalReview::from_reader(&b"Site\n\n"[..]);
        let field = LookupField::new("AccountId", "Account", "Name");

        assert_eq!(
            review.review_lookup(&field, 2, &[]).await,
            ReviewDecision::Reselect("Site".into())
        );
        assert_eq!(review.review_lookup(&field, 2, &[]).await, ReviewDecision::Accept);
        // End of input accepts.
        assert_eq!(review.review_lookup(&field, 2, &[]).await, ReviewDecision::Accept);
    }
}
