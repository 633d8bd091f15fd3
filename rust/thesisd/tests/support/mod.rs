#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    _child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_thesisd");
        let mut child = Command::new(exe)
            .env_remove("THESISD_WORKSPACE")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn thesisd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            _child: child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    /// Spawns and selects a fresh workspace.
    pub fn with_workspace(prefix: &str) -> Self {
        let mut s = Self::spawn();
        let ws = temp_dir(prefix);
        s.ok("workspace.select", json!({ "path": ws.to_string_lossy() }));
        s
    }

    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Asserts failure and returns the error code.
    pub fn fail(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    pub fn create_student(&mut self, name: &str) -> String {
        let r = self.ok("students.create", json!({ "displayName": name }));
        str_field(&r, "studentId")
    }

    pub fn create_proposal(&mut self, student_id: &str, tutor_id: &str, instructor_id: &str) -> String {
        let r = self.ok(
            "proposals.create",
            json!({
                "studentId": student_id,
                "title": "Sistema de seguimiento",
                "tutorId": tutor_id,
                "instructorId": instructor_id
            }),
        );
        str_field(&r, "proposalId")
    }

    /// Declares and approves all three required prerequisites.
    pub fn approve_all_prerequisites(&mut self, student_id: &str) {
        for name in ["Suficiencia de Inglés", "Prácticas preprofesionales", "Vinculación con la sociedad"] {
            let r = self.ok(
                "prerequisites.declare",
                json!({ "studentId": student_id, "nombre": name }),
            );
            let id = str_field(&r, "prerequisiteId");
            self.ok(
                "prerequisites.verify",
                json!({ "prerequisiteId": id, "role": "coordinator", "approve": true }),
            );
        }
    }

    pub fn create_activity(&mut self, proposal_id: &str, semana: i64) -> String {
        let r = self.ok(
            "activities.create",
            json!({
                "proposalId": proposal_id,
                "nombre": format!("Avance semana {}", semana),
                "semana": semana,
                "tipo": "tutor"
            }),
        );
        str_field(&r, "activityId")
    }

    pub fn submit_evidence(&mut self, activity_id: &str) -> String {
        let r = self.ok(
            "evidences.submit",
            json!({ "activityId": activity_id, "contenido": "entrega" }),
        );
        str_field(&r, "evidenceId")
    }
}

pub fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
        .to_string()
}
