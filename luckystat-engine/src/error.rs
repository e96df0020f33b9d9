/// Erreurs de saisie remontées à l'appelant ; la génération est abandonnée.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Sélectionnez au moins une couleur")]
    NoColorSelected,

    #[error("Les couleurs choisies ne couvrent que {available} numéros, il en faut 6")]
    InsufficientColorSpan { available: usize },

    #[error("Impossible de tirer {k} numéros distincts parmi {span}")]
    SampleTooLarge { k: usize, span: usize },
}
