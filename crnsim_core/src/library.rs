//! Ready made models

use indexmap::IndexMap;

use crate::network::model::{Model, ModelError, ReactionTuple};

/// Toy gene expression network of transcription, translation and degradation
///
/// Species: gene `G`, transcript `T`, protein `P` and ribosome `R`.
/// - G → G + T, mass action with `k_tx`
/// - T → T + P, translation proportional to T and saturating in R (`k_tl`, `K`)
/// - T → ∅ and P → ∅, mass action with `delta`
pub fn gene_expression() -> Result<Model, ModelError> {
    let reactions = vec![
        ReactionTuple::new(&["G"], &["G", "T"], "massaction", &[("k", "k_tx")]),
        ReactionTuple::new(
            &["T"],
            &["T", "P"],
            "proportionalhillpositive",
            &[("k", "k_tl"), ("d", "T"), ("s1", "R"), ("K", "K"), ("n", "1")],
        ),
        ReactionTuple::new(&["T"], &[], "massaction", &[("k", "delta")]),
        ReactionTuple::new(&["P"], &[], "massaction", &[("k", "delta")]),
    ];
    let parameters = IndexMap::from([
        ("k_tx".to_string(), 0.05),
        ("k_tl".to_string(), 0.1),
        ("K".to_string(), 10.0),
        ("delta".to_string(), 0.001),
    ]);
    let mut model = Model::from_tuples(
        &["G", "T", "P", "R"],
        reactions,
        parameters,
        gene_expression_initial_state(),
    )?;
    model.id = Some("gene_expression".to_string());
    Ok(model)
}

/// One gene copy and 100 ribosomes, no transcript or protein
pub fn gene_expression_initial_state() -> IndexMap<String, f64> {
    IndexMap::from([
        ("G".to_string(), 1.0),
        ("R".to_string(), 100.0),
        ("T".to_string(), 0.0),
        ("P".to_string(), 0.0),
    ])
}
