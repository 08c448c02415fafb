//! Token-budget trimming.
//!
//! Items are removed from the **end** of the list until the total cost fits
//! the budget or the list is empty. For turn history this drops the newest
//! turns first.

use helperbot_core::message::{ContextPassage, Turn};
use tracing::debug;

use super::token::TokenCounter;

/// Trim `items` in place so their summed `cost` is at most `budget`.
///
/// Returns the number of items removed. A list already within budget is
/// left untouched.
pub fn trim_to_budget<T>(items: &mut Vec<T>, budget: usize, cost: impl Fn(&T) -> usize) -> usize {
    let mut total: usize = items.iter().map(&cost).sum();
    let mut removed = 0;

    while total > budget {
        let Some(last) = items.pop() else { break };
        total = total.saturating_sub(cost(&last));
        removed += 1;
    }

    if removed > 0 {
        debug!(removed, remaining = items.len(), total, budget, "Trimmed to token budget");
    }
    removed
}

/// Trim conversation turns; each costs its content plus its role label.
pub fn trim_turns(turns: &mut Vec<Turn>, budget: usize, counter: &TokenCounter) -> usize {
    trim_to_budget(turns, budget, |t| counter.turn_cost(t))
}

/// Trim context passages; each costs its labeled form.
pub fn trim_passages(
    passages: &mut Vec<ContextPassage>,
    budget: usize,
    counter: &TokenCounter,
) -> usize {
    trim_to_budget(passages, budget, |p| counter.passage_cost(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn len_cost(s: &String) -> usize {
        s.len()
    }

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn within_budget_is_untouched() {
        let mut items = words(&["aa", "bbb"]);
        assert_eq!(trim_to_budget(&mut items, 5, len_cost), 0);
        assert_eq!(items, words(&["aa", "bbb"]));
    }

    #[test]
    fn drops_from_the_end() {
        let mut items = words(&["oldest", "middle", "newest"]);
        let removed = trim_to_budget(&mut items, 12, len_cost);
        assert_eq!(removed, 1);
        assert_eq!(items, words(&["oldest", "middle"]));
    }

    #[test]
    fn zero_budget_empties_everything() {
        let mut items = words(&["a", "b", "c"]);
        trim_to_budget(&mut items, 0, len_cost);
        assert!(items.is_empty());
    }

    #[test]
    fn oversized_first_item_leaves_empty() {
        let mut items = words(&["far too long for the budget", "x"]);
        trim_to_budget(&mut items, 3, len_cost);
        assert!(items.is_empty());
    }

    #[test]
    fn empty_list_is_fine() {
        let mut items: Vec<String> = Vec::new();
        assert_eq!(trim_to_budget(&mut items, 0, len_cost), 0);
    }

    #[test]
    fn turn_history_with_zero_budget() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
        let mut turns = vec![Turn::user("hi"), Turn::assistant("hello! 👋")];
        trim_turns(&mut turns, 0, &counter);
        assert!(turns.is_empty());
    }

    #[test]
    fn passages_trimmed_by_labeled_cost() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
        let first = ContextPassage::new("A2SV is a talent accelerator", "A2SV section");
        let second = ContextPassage::new("Hackathon starts in May", "A2SV section");
        let budget = counter.passage_cost(&first);

        let mut passages = vec![first.clone(), second];
        trim_passages(&mut passages, budget, &counter);
        assert_eq!(passages, vec![first]);
    }

    proptest! {
        #[test]
        fn result_fits_budget_or_is_empty(
            costs in proptest::collection::vec(0usize..50, 0..20),
            budget in 0usize..300,
        ) {
            let mut items = costs.clone();
            trim_to_budget(&mut items, budget, |c| *c);
            let total: usize = items.iter().sum();
            prop_assert!(total <= budget || items.is_empty());
        }

        #[test]
        fn result_is_a_prefix(
            costs in proptest::collection::vec(0usize..50, 0..20),
            budget in 0usize..300,
        ) {
            let mut items = costs.clone();
            trim_to_budget(&mut items, budget, |c| *c);
            prop_assert_eq!(&costs[..items.len()], &items[..]);
        }

        #[test]
        fn trimming_is_idempotent(
            costs in proptest::collection::vec(0usize..50, 0..20),
            budget in 0usize..300,
        ) {
            let mut once = costs.clone();
            trim_to_budget(&mut once, budget, |c| *c);
            let mut twice = once.clone();
            let removed = trim_to_budget(&mut twice, budget, |c| *c);
            prop_assert_eq!(removed, 0);
            prop_assert_eq!(once, twice);
        }
    }
}
