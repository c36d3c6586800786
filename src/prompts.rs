//! Prompts sent to the OCR and translation models.
//!
//! Kept in one place so wording changes never touch transport code, and so
//! tests can assert on the invariants the pipeline relies on (the translation
//! prompts must tell the model to leave Spanish text alone).

/// Instruction sent with each page image to the local vision model.
pub const LOCAL_OCR_PROMPT: &str = "Extrae TODO el texto visible en esta imagen con la mayor precisión posible.

Reglas:
- Incluye encabezados, párrafos, listas, números, fechas y notas al pie
- Respeta el orden de lectura y la separación en párrafos
- No omitas texto pequeño ni parcialmente visible
- Conserva todas las cifras, importes, fechas y referencias
- Si hay tablas, mantén su estructura por filas
- Devuelve solo el texto, sin resúmenes ni comentarios

Texto:";

/// Instruction sent with each page image to the cloud model.
pub const CLOUD_OCR_PROMPT: &str = "<image>
<|grounding|>Transcribe TODO el texto de este documento de forma completa y exacta.

Reglas:
- Títulos, párrafos, listas, notas al pie y referencias
- Todas las cifras: fechas, cantidades, precios, teléfonos
- Usa tablas markdown si el documento contiene tablas
- No omitas texto pequeño ni notas al margen
- Transcribe sin resumir ni parafrasear
- Ignora logotipos e imágenes; solo el texto

Texto completo:";

/// System message for the cloud translator.
pub const TRANSLATION_SYSTEM_PROMPT: &str = "Eres un traductor profesional. Traduce el texto al español conservando el formato original. Si el texto ya está en español, devuélvelo sin cambios.";

/// User message for the cloud translator.
pub fn translation_user_prompt(text: &str) -> String {
    format!("Traduce este texto al español:\n\n{text}")
}

/// Single-shot prompt for the local translator.
pub fn local_translation_prompt(text: &str) -> String {
    format!(
        "Eres un traductor profesional. Traduce el siguiente texto al español.

REGLAS:
- Si el texto ya está en español, devuélvelo SIN CAMBIOS
- Si está en inglés u otro idioma, tradúcelo al español
- No añadas explicaciones, comentarios ni introducciones
- Mantén el formato y la estructura del original

TEXTO:
{text}

TRADUCCIÓN AL ESPAÑOL:"
    )
}
