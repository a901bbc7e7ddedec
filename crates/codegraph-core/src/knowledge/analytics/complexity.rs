//! Keyword-based complexity ranking.

use serde::{Deserialize, Serialize};

use super::calls::FunctionSummary;
use super::Analytics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    /// 1 + decision keyword occurrences in the source text
    pub cyclomatic_complexity: usize,
    pub dependency_count: usize,
    pub nested_functions: usize,
    pub total_complexity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexFunction {
    pub function: FunctionSummary,
    pub metrics: ComplexityMetrics,
}

impl<'g> Analytics<'g> {
    /// Functions with source text whose total score reaches `threshold`,
    /// highest first. The score is a ranking heuristic, not a control-flow
    /// measure.
    pub fn find_complex_functions(&self, threshold: usize) -> Vec<ComplexFunction> {
        let mut results: Vec<ComplexFunction> = self
            .graph
            .functions()
            .filter_map(|f| {
                let source = f.raw_string.as_deref()?;
                let metrics = self.score(&f.id, source);
                (metrics.total_complexity >= threshold).then(|| ComplexFunction {
                    function: FunctionSummary::from(f),
                    metrics,
                })
            })
            .collect();
        results.sort_by(|a, b| {
            b.metrics
                .total_complexity
                .cmp(&a.metrics.total_complexity)
                .then_with(|| a.function.id.cmp(&b.function.id))
        });
        results
    }

    fn score(&self, function_id: &str, source: &str) -> ComplexityMetrics {
        let keywords: usize = self
            .config
            .complexity_keywords
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| source.matches(k.as_str()).count())
            .sum();
        let cyclomatic_complexity = 1 + keywords;
        let dependency_count = self.graph.callees_of(function_id).count();
        let nested_functions = self.graph.nested_under(function_id).count();
        ComplexityMetrics {
            cyclomatic_complexity,
            dependency_count,
            nested_functions,
            total_complexity: cyclomatic_complexity + dependency_count + nested_functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::builder::GraphBuilder;
    use crate::knowledge::facts::FactBatch;
    use serde_json::json;

    #[test]
    fn test_complexity_scoring() {
        let batch = FactBatch::from_value(json!({
            "module_name": "m",
            "functions": [
                {"name": "branchy",
                 "raw_string": "branchy x = case x of\n  0 -> if a then b else c\n  _ -> go x\n  where go = id",
                 "functions_called": [{"module_name": "m", "name": "plain"}],
                 "where_functions": {"go": {}}},
                {"name": "plain", "raw_string": "plain = 1"},
                {"name": "opaque"}
            ]
        }));
        let graph = GraphBuilder::default().build(&batch).unwrap().graph;
        let analytics = Analytics::with_defaults(&graph);

        let all = analytics.find_complex_functions(0);
        assert_eq!(all.len(), 2);
        let top = &all[0];
        assert_eq!(top.function.name, "branchy");
        // case, of, if, where, two arrows
        assert_eq!(top.metrics.cyclomatic_complexity, 7);
        assert_eq!(top.metrics.dependency_count, 1);
        assert_eq!(top.metrics.nested_functions, 1);
        assert_eq!(top.metrics.total_complexity, 9);

        assert_eq!(analytics.find_complex_functions(9).len(), 1);
        assert!(analytics.find_complex_functions(10).is_empty());
    }
}
