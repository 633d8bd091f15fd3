use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Which grading track an activity (or a grading sheet) belongs to.
/// The backend tags integration-instructor work as `docente`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Track {
    #[default]
    #[serde(rename = "tutor")]
    Tutor,
    #[serde(rename = "docente", alias = "instructor")]
    Instructor,
}

impl Track {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tutor" => Some(Self::Tutor),
            "docente" | "instructor" => Some(Self::Instructor),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tutor => "tutor",
            Self::Instructor => "docente",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Tutor,
    IntegrationInstructor,
    Director,
    Coordinator,
    Reviewer,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" | "estudiante" => Some(Self::Student),
            "tutor" => Some(Self::Tutor),
            "integration_instructor" | "docente" => Some(Self::IntegrationInstructor),
            "director" => Some(Self::Director),
            "coordinator" | "coordinador" => Some(Self::Coordinator),
            "reviewer" | "revisor" => Some(Self::Reviewer),
            _ => None,
        }
    }

    /// Only these roles may flip a prerequisite's fulfilled flag.
    pub fn can_verify_prerequisites(self) -> bool {
        matches!(self, Self::Coordinator | Self::Director)
    }

    pub fn grading_track(self) -> Option<Track> {
        match self {
            Self::Tutor => Some(Track::Tutor),
            Self::IntegrationInstructor => Some(Track::Instructor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerequisiteRecord {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "de_fulfilled")]
    pub cumplido: bool,
    #[serde(default)]
    pub archivo_url: Option<String>,
    #[serde(default)]
    pub enviado: bool,
    /// Explicit canonical kind assigned when the record was declared.
    #[serde(default)]
    pub tipo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub fecha_entrega: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archivo_url: Option<String>,
    #[serde(default)]
    pub contenido: Option<String>,
    #[serde(default)]
    pub calificacion_tutor: Option<f64>,
    #[serde(default)]
    pub calificacion_docente: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retroalimentacion_tutor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retroalimentacion_docente: Option<String>,
}

impl Evidence {
    pub fn grade(&self, track: Track) -> Option<f64> {
        match track {
            Track::Tutor => self.calificacion_tutor,
            Track::Instructor => self.calificacion_docente,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub semana: i64,
    #[serde(default)]
    pub tipo: Track,
    #[serde(default)]
    pub evidencias: Vec<Evidence>,
}

/// Backend fulfilled flags arrive as `true`, `1` or `"1"`; everything else is false.
pub fn is_truthy_flag(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64() == Some(1.0),
        serde_json::Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

fn de_fulfilled<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(d)?;
    Ok(is_truthy_flag(&v))
}

fn id_from_value(v: serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn de_opt_id<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(d)?;
    Ok(id_from_value(v))
}

fn de_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(d)?;
    id_from_value(v).ok_or_else(|| serde::de::Error::custom("id must be a string or number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fulfilled_flag_accepts_bool_one_and_string_one() {
        for raw in [json!(true), json!(1), json!(1.0), json!("1")] {
            let rec: PrerequisiteRecord =
                serde_json::from_value(json!({ "nombre": "Inglés", "cumplido": raw }))
                    .expect("parse record");
            assert!(rec.cumplido, "expected truthy for {raw}");
        }
        for raw in [json!(false), json!(0), json!("0"), json!("true"), json!(null), json!(2), json!(0.5)] {
            let rec: PrerequisiteRecord =
                serde_json::from_value(json!({ "nombre": "Inglés", "cumplido": raw }))
                    .expect("parse record");
            assert!(!rec.cumplido, "expected falsy for {raw}");
        }
    }

    #[test]
    fn numeric_ids_become_strings() {
        let rec: PrerequisiteRecord =
            serde_json::from_value(json!({ "id": 42, "nombre": "Prácticas" })).expect("parse");
        assert_eq!(rec.id.as_deref(), Some("42"));

        let rec: PrerequisiteRecord =
            serde_json::from_value(json!({ "id": null })).expect("parse");
        assert_eq!(rec.id, None);
        assert_eq!(rec.nombre, None);
    }

    #[test]
    fn activity_parses_backend_shape() {
        let a: Activity = serde_json::from_value(json!({
            "id": 7,
            "nombre": "Marco teórico",
            "semana": 3,
            "tipo": "docente",
            "evidencias": [{
                "id": "e1",
                "fechaEntrega": "2026-03-02T10:00:00Z",
                "archivoUrl": "files/e1.pdf",
                "contenido": "draft",
                "calificacionTutor": null,
                "calificacionDocente": 8
            }]
        }))
        .expect("parse activity");

        assert_eq!(a.id, "7");
        assert_eq!(a.tipo, Track::Instructor);
        assert_eq!(a.evidencias.len(), 1);
        assert_eq!(a.evidencias[0].grade(Track::Instructor), Some(8.0));
        assert_eq!(a.evidencias[0].grade(Track::Tutor), None);
    }

    #[test]
    fn roles_map_to_tracks_and_verification_rights() {
        assert_eq!(Role::parse("tutor").and_then(|r| r.grading_track()), Some(Track::Tutor));
        assert_eq!(
            Role::parse("integration_instructor").and_then(|r| r.grading_track()),
            Some(Track::Instructor)
        );
        assert!(Role::parse("student").and_then(|r| r.grading_track()).is_none());
        assert!(Role::Coordinator.can_verify_prerequisites());
        assert!(!Role::Student.can_verify_prerequisites());
        assert!(!Role::Tutor.can_verify_prerequisites());
    }
}
