//! Inbound endpoint called by Parcoursup to deliver admission decisions.
//!
//! The contract is the vendor's, not ours: POST of a JSON object carrying
//! `identifiant.login`/`identifiant.pwd` next to the candidate facts, and a
//! `{"retour": "OK"|"NOK", "message": ...}` reply with HTTP 200 on
//! success, 500 on any failure, always a valid JSON body.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::workflows::parcoursup::payload::{parse_admission, DonneesBrutes};

use super::import::ImportService;
use super::repository::{DossierStore, MailGateway, Parametrage};

#[derive(Debug, Serialize)]
struct ReponseParcoursup {
    retour: &'static str,
    message: String,
}

fn ok(message: &str) -> Response {
    (
        StatusCode::OK,
        Json(ReponseParcoursup {
            retour: "OK",
            message: message.to_string(),
        }),
    )
        .into_response()
}

fn nok(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ReponseParcoursup {
            retour: "NOK",
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Router builder for the Parcoursup-facing surface.
pub fn parcoursup_router<S, P, M>(service: Arc<ImportService<S, P, M>>) -> Router
where
    S: DossierStore + 'static,
    P: Parametrage + 'static,
    M: MailGateway + 'static,
{
    Router::new()
        .route(
            "/parcoursup/admissionCandidat",
            post(admission_handler::<S, P, M>),
        )
        .with_state(service)
}

async fn admission_handler<S, P, M>(
    State(service): State<Arc<ImportService<S, P, M>>>,
    corps: Result<Json<Value>, JsonRejection>,
) -> Response
where
    S: DossierStore + 'static,
    P: Parametrage + 'static,
    M: MailGateway + 'static,
{
    let Ok(Json(corps)) = corps else {
        warn!("message Parcoursup rejeté: pas du JSON valide");
        return nok("Les données soumises ne sont pas au format JSON valide");
    };

    // Credentials ride in the body; the outer key is case-insensitive like
    // the rest of the vendor's payload.
    let authentifie = DonneesBrutes::nouvelles(&corps)
        .ok()
        .and_then(|donnees| donnees.valeur("identifiant").cloned())
        .and_then(|identifiant| {
            let login = identifiant.get("login")?.as_str()?.to_string();
            let pwd = identifiant.get("pwd")?.as_str()?.to_string();
            service.parametrage().authentifier_entrant(&login, &pwd)
        });
    let Some(uai) = authentifie else {
        warn!("message Parcoursup rejeté: identification incorrecte");
        return nok("Données d'identification incorrectes");
    };

    let admission = match parse_admission(&corps) {
        Ok(admission) => admission,
        Err(erreur) => {
            warn!(etablissement = %uai, %erreur, "message Parcoursup illisible");
            return nok(&erreur.to_string());
        }
    };

    match service.import_admission(&admission) {
        Ok(candidat) => {
            info!(
                etablissement = %uai,
                candidat = %candidat.dossier,
                "admission traitée"
            );
            ok("Requete correctement traitee")
        }
        Err(erreur) => {
            warn!(etablissement = %uai, %erreur, "échec du traitement de l'admission");
            nok(&erreur.to_string())
        }
    }
}
