use std::io::Cursor;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use admissup::error::AppError;
use admissup::workflows::inscription::{
    parcoursup_router, Acteur, CodeFormation, Dossier, DossierStore, Fiche, ImportError, Mailing,
    NumeroDossier, Parametrage,
};
use admissup::workflows::inscription::fiches::{terminer_toutes, ContexteValidation};
use admissup::workflows::parcoursup::{
    parse_export, synchroniser, EtatInscription, FiltreAdmis, ParcoursupClient, PasserelleReqwest,
};

use crate::infra::{AppState, Service};

/// State shared by the staff-facing routes.
#[derive(Clone)]
pub(crate) struct EtatService {
    pub(crate) service: Arc<Service>,
    pub(crate) endpoint: String,
}

pub(crate) fn with_api_routes(etat: EtatService) -> Router {
    parcoursup_router(etat.service.clone())
        .merge(routes_gestion(etat))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

fn routes_gestion(etat: EtatService) -> Router {
    Router::new()
        .route("/api/v1/candidats/:dossier", get(candidat_detail))
        .route(
            "/api/v1/candidats/:dossier/fiches/:fiche",
            post(action_fiche),
        )
        .route("/api/v1/candidats/:dossier/valider", post(valider_dossier))
        .route(
            "/api/v1/candidats/:dossier/confirmation",
            post(confirmation_administrative),
        )
        .route("/api/v1/synchronisation", post(synchronisation_manuelle))
        .route("/api/v1/import/export-admis", post(import_export_csv))
        .route("/api/v1/mailings/envoyer", post(envoyer_mailing))
        .with_state(etat)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Serialize)]
struct VueFiche {
    id: u64,
    fiche: &'static str,
    etat: &'static str,
    valide: bool,
}

impl VueFiche {
    fn depuis(fiche: &Fiche) -> Self {
        Self {
            id: fiche.id.0,
            fiche: fiche.kind().label(),
            etat: fiche.etat.label(),
            valide: fiche.valide,
        }
    }
}

#[derive(Debug, Serialize)]
struct VueDossier {
    dossier: u32,
    nom: String,
    prenom: String,
    email: String,
    inscription_confirmee: bool,
    voeu: Option<serde_json::Value>,
    etat_dossier: Option<&'static str>,
    /// Where the candidate sends their supporting documents.
    envoi_pieces: Option<String>,
    fiches: Vec<VueFiche>,
}

fn vue_dossier(dossier: &Dossier, parametrage: &dyn Parametrage) -> VueDossier {
    let voeu = dossier.voeu_actuel().ok().copied();
    let accueil = voeu
        .and_then(|voeu| parametrage.formation(voeu.formation))
        .and_then(|formation| {
            parametrage
                .etablissement(&formation.etablissement)
                .map(|etablissement| (formation, etablissement))
        });
    let etat_dossier = accueil.as_ref().map(|(_, etablissement)| {
        dossier.etat_dossier(etablissement.fiches.iter()).label()
    });
    let envoi_pieces = accueil
        .as_ref()
        .map(|(formation, etablissement)| formation.email_pieces(etablissement).to_string());

    VueDossier {
        dossier: dossier.candidat.dossier.0,
        nom: dossier.candidat.nom.clone(),
        prenom: dossier.candidat.prenom.clone(),
        email: dossier.candidat.compte.email.clone(),
        inscription_confirmee: dossier.candidat.inscription_confirmee,
        voeu: voeu.map(|voeu| {
            json!({
                "formation": voeu.formation.0,
                "internat": voeu.internat,
                "cesure": voeu.cesure,
                "etat": voeu.etat.label(),
            })
        }),
        etat_dossier,
        envoi_pieces,
        fiches: dossier
            .fiches
            .iter()
            .map(VueFiche::depuis)
            .collect(),
    }
}

fn charger_dossier(etat: &EtatService, numero: u32) -> Result<Dossier, AppError> {
    etat.service
        .store()
        .charger(NumeroDossier(numero))
        .map_err(|erreur| AppError::Import(erreur.into()))?
        .ok_or(AppError::Import(ImportError::CandidatInconnu {
            dossier: NumeroDossier(numero),
        }))
}

async fn candidat_detail(
    State(etat): State<EtatService>,
    Path(numero): Path<u32>,
) -> Result<Json<VueDossier>, AppError> {
    let dossier = charger_dossier(&etat, numero)?;
    Ok(Json(vue_dossier(&dossier, &**etat.service.parametrage())))
}

#[derive(Debug, Deserialize)]
struct DemandeAction {
    action: ActionFiche,
    acteur: Acteur,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ActionFiche {
    Confirmer,
    Terminer,
    Rouvrir,
}

async fn action_fiche(
    State(etat): State<EtatService>,
    Path((numero, fiche)): Path<(u32, u64)>,
    Json(demande): Json<DemandeAction>,
) -> Result<axum::response::Response, AppError> {
    let mut dossier = charger_dossier(&etat, numero)?;

    let Some(position) = dossier.fiches.iter().position(|f| f.id.0 == fiche) else {
        let payload = json!({ "error": format!("fiche {fiche} inconnue") });
        return Ok((StatusCode::NOT_FOUND, Json(payload)).into_response());
    };

    let transition = {
        let fiche = &mut dossier.fiches[position];
        match demande.action {
            ActionFiche::Confirmer => fiche.confirmer(demande.acteur),
            ActionFiche::Terminer => fiche.terminer(demande.acteur),
            ActionFiche::Rouvrir => fiche.rouvrir(demande.acteur),
        }
    };
    if let Err(erreur) = transition {
        let payload = json!({ "error": erreur.to_string() });
        return Ok((StatusCode::CONFLICT, Json(payload)).into_response());
    }

    revalider(&mut dossier, &etat);
    let vue = VueFiche::depuis(&dossier.fiches[position]);
    etat.service
        .store()
        .sauvegarder(dossier)
        .map_err(|erreur| AppError::Import(erreur.into()))?;
    Ok((StatusCode::OK, Json(vue)).into_response())
}

/// Recompute every live fiche's validity against the current wish. Left
/// as-is when the wish or its referential entries are missing.
fn revalider(dossier: &mut Dossier, etat: &EtatService) {
    let parametrage = etat.service.parametrage();
    let Ok(voeu) = dossier.voeu_actuel() else {
        return;
    };
    let Some(formation) = parametrage.formation(voeu.formation) else {
        return;
    };
    let Some(etablissement) = parametrage.etablissement(&formation.etablissement) else {
        return;
    };
    let contexte = ContexteValidation {
        etablissement: &etablissement,
        formation: &formation,
    };
    for fiche in dossier.fiches.iter_mut() {
        fiche.valider(&contexte);
    }
}

async fn valider_dossier(
    State(etat): State<EtatService>,
    Path(numero): Path<u32>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut dossier = charger_dossier(&etat, numero)?;

    let parametrage = etat.service.parametrage();
    let etablissement = dossier
        .voeu_actuel()
        .ok()
        .and_then(|voeu| parametrage.formation(voeu.formation))
        .and_then(|formation| parametrage.etablissement(&formation.etablissement));
    let Some(etablissement) = etablissement else {
        return Ok(Json(json!({ "validees": 0 })));
    };

    let validees = terminer_toutes(&mut dossier, &etablissement);
    etat.service
        .store()
        .sauvegarder(dossier)
        .map_err(|erreur| AppError::Import(erreur.into()))?;
    Ok(Json(json!({ "validees": validees })))
}

#[derive(Debug, Deserialize)]
struct DemandeConfirmation {
    #[serde(default)]
    message: String,
}

/// Push the administrative-enrollment confirmation back to Parcoursup,
/// then record it on the candidate.
async fn confirmation_administrative(
    State(etat): State<EtatService>,
    Path(numero): Path<u32>,
    Json(demande): Json<DemandeConfirmation>,
) -> Result<axum::response::Response, AppError> {
    let dossier = charger_dossier(&etat, numero)?;

    let voeu = match dossier.voeu_actuel() {
        Ok(voeu) => *voeu,
        Err(erreur) => {
            let payload = json!({ "error": erreur.to_string() });
            return Ok((StatusCode::CONFLICT, Json(payload)).into_response());
        }
    };
    let client = client_pour(&etat, voeu.formation)?;

    client
        .maj_inscription(&dossier.candidat, voeu.formation, EtatInscription::Principale)
        .await?;

    let candidat = etat
        .service
        .enregistrer_confirmation(NumeroDossier(numero), &demande.message)?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "dossier": candidat.dossier.0,
            "inscription_confirmee": candidat.inscription_confirmee,
            "message": candidat.message_confirmation,
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct DemandeSynchronisation {
    etablissement: String,
    #[serde(default)]
    formation: Option<i32>,
    #[serde(default)]
    candidat: Option<u32>,
}

/// Pull-model sync, triggered by staff. Per-record failures are collected
/// in the bilan; only a transport/service failure aborts.
async fn synchronisation_manuelle(
    State(etat): State<EtatService>,
    Json(demande): Json<DemandeSynchronisation>,
) -> Result<Json<serde_json::Value>, AppError> {
    let parametrage = etat.service.parametrage();
    let Some(etablissement) = parametrage.etablissement(&demande.etablissement) else {
        return Err(AppError::Import(ImportError::EtablissementInconnu {
            uai: demande.etablissement,
        }));
    };
    if !etablissement.inscriptions {
        let payload = json!({ "importes": 0, "rejets": [], "message": "synchronisation désactivée" });
        return Ok(Json(payload));
    }

    let acces = parametrage.acces(&etablissement.uai).ok_or_else(|| {
        AppError::Import(ImportError::EtablissementInconnu {
            uai: etablissement.uai.clone(),
        })
    })?;
    let client = ParcoursupClient::new(
        PasserelleReqwest::default(),
        etat.endpoint.clone(),
        acces.sortant_login,
        acces.sortant_password,
        acces.etablissement,
    );

    let filtre = FiltreAdmis {
        code_candidat: demande.candidat.map(NumeroDossier),
        formation: demande.formation.map(CodeFormation),
    };
    let bilan = synchroniser(&client, &etat.service, filtre).await?;
    Ok(Json(bilan_json(&bilan)))
}

#[derive(Debug, Deserialize)]
struct DemandeImportExport {
    etablissement: String,
    formation: i32,
    csv: String,
}

/// Bulk import of a Parcoursup CSV export pasted or uploaded by staff.
async fn import_export_csv(
    State(etat): State<EtatService>,
    Json(demande): Json<DemandeImportExport>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admissions = parse_export(
        Cursor::new(demande.csv.into_bytes()),
        &demande.etablissement,
        CodeFormation(demande.formation),
    )?;
    let bilan = etat.service.importer_lot(admissions);
    Ok(Json(bilan_json(&bilan)))
}

fn bilan_json(bilan: &admissup::workflows::inscription::BilanImport) -> serde_json::Value {
    json!({
        "importes": bilan.importes,
        "rejets": bilan
            .rejets
            .iter()
            .map(|rejet| json!({ "reference": rejet.reference, "erreur": rejet.erreur }))
            .collect::<Vec<_>>(),
    })
}

/// Run a mailing over the whole registry. The updated send journal comes
/// back with the bilan so the caller can persist it.
async fn envoyer_mailing(
    State(etat): State<EtatService>,
    Json(mut mailing): Json<Mailing>,
) -> Result<Json<serde_json::Value>, AppError> {
    let dossiers = etat
        .service
        .store()
        .tous()
        .map_err(|erreur| AppError::Import(erreur.into()))?;
    let bilan = mailing.envoyer(
        &dossiers,
        &**etat.service.parametrage(),
        etat.service.courrier().as_ref(),
        Utc::now(),
    );
    Ok(Json(json!({ "bilan": bilan, "mailing": mailing })))
}

fn client_pour(
    etat: &EtatService,
    formation: CodeFormation,
) -> Result<ParcoursupClient<PasserelleReqwest>, AppError> {
    let parametrage = etat.service.parametrage();
    let formation = parametrage.formation(formation).ok_or(AppError::Import(
        ImportError::FormationInconnue { code: formation },
    ))?;
    let acces = parametrage.acces(&formation.etablissement).ok_or_else(|| {
        AppError::Import(ImportError::EtablissementInconnu {
            uai: formation.etablissement.clone(),
        })
    })?;
    Ok(ParcoursupClient::new(
        PasserelleReqwest::default(),
        etat.endpoint.clone(),
        acces.sortant_login,
        acces.sortant_password,
        acces.etablissement,
    ))
}
