use actix_files::NamedFile;
use actix_web::{get, http, web, App, HttpRequest, HttpResponse, HttpServer, Result};
use tera::Tera;

use std::path::PathBuf;

mod logger;
mod store;
use logger::RequestLogger;
use store::{Message, MessageStore};

use chrono::Local;

use env_logger::Env;
use log::{error, info};
use serde::{Deserialize, Serialize};

// Messages as the templates see them, timestamps already formatted.
#[derive(Serialize)]
struct MessageTdo {
    id: u64,
    author: String,
    content: String,
    created: String,
}

fn to_tdos(messages: &[Message]) -> Vec<MessageTdo> {
    messages
        .iter()
        .map(|msg| MessageTdo {
            id: msg.id,
            author: msg.author.clone(),
            content: msg.content.clone(),
            created: msg
                .created
                .with_timezone(&Local)
                .format("%d/%m/%Y %H:%M:%S")
                .to_string(),
        })
        .collect()
}

struct AppState {
    tera: Tera,
    store: MessageStore,
}

/// Renders a template to a 200 page, or a 500 if tera fails. A render
/// failure is request-scoped; it gets logged and the process carries on.
fn render_page(tera: &Tera, name: &str, context: &tera::Context) -> HttpResponse {
    match tera.render(name, context) {
        Ok(output) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(output),
        Err(e) => {
            error!("rendering {}: {}", name, e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

fn redirect_home() -> HttpResponse {
    HttpResponse::SeeOther()
        .header(http::header::LOCATION, "/")
        .finish()
}

#[get("/static/{filename:.*}")]
async fn get_static(req: HttpRequest) -> Result<NamedFile> {
    let path: PathBuf = req.match_info().query("filename").parse().unwrap();
    let mut whole_path = PathBuf::new();
    whole_path.push("static");
    whole_path.push(path);
    Ok(NamedFile::open(whole_path)?)
}

#[get("/")]
async fn get_index(data: web::Data<AppState>) -> HttpResponse {
    let messages = data.store.snapshot();
    let mut context = tera::Context::new();
    context.insert("title", "Home");
    context.insert("messages", &to_tdos(&messages));
    context.insert("now", &Local::now().format("%d/%m/%Y %H:%M:%S").to_string());
    render_page(&data.tera, "index.html", &context)
}

#[get("/about")]
async fn get_about(data: web::Data<AppState>) -> HttpResponse {
    let mut context = tera::Context::new();
    context.insert("title", "About");
    context.insert("now", &Local::now().format("%d/%m/%Y %H:%M:%S").to_string());
    render_page(&data.tera, "about.html", &context)
}

#[derive(Deserialize)]
struct SubmitForm {
    #[serde(default)]
    author: String,
    #[serde(default)]
    content: String,
}

// Invalid submissions are dropped silently; the redirect makes the browser
// reload the page either way.
async fn post_submit(form: web::Form<SubmitForm>, data: web::Data<AppState>) -> HttpResponse {
    let author = form.author.trim();
    let content = form.content.trim();
    if !content.is_empty() {
        data.store.insert(author, content);
    }
    redirect_home()
}

async fn submit_fallback() -> HttpResponse {
    redirect_home()
}

#[derive(Deserialize)]
struct MessageInput {
    #[serde(default)]
    author: String,
    #[serde(default)]
    content: String,
}

async fn api_get_messages(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.store.snapshot())
}

async fn api_post_message(body: web::Bytes, data: web::Data<AppState>) -> HttpResponse {
    let input: MessageInput = match serde_json::from_slice(&body) {
        Ok(input) => input,
        Err(_) => return HttpResponse::BadRequest().body("Bad JSON"),
    };
    if input.content.trim().is_empty() {
        return HttpResponse::BadRequest().body("content required");
    }
    let msg = data.store.insert(&input.author, &input.content);
    HttpResponse::Created().json(msg)
}

async fn api_method_fallback() -> HttpResponse {
    HttpResponse::MethodNotAllowed().body("Method not allowed")
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_static)
        .service(get_index)
        .service(get_about)
        .service(
            web::resource("/submit")
                .route(web::post().to(post_submit))
                .default_service(web::route().to(submit_fallback)),
        )
        .service(
            web::resource("/api/messages")
                .route(web::get().to(api_get_messages))
                .route(web::post().to(api_post_message))
                .default_service(web::route().to(api_method_fallback)),
        );
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let tera = match Tera::new("templates/*.html") {
        Ok(t) => t,
        Err(e) => {
            error!("Parsing templates: {}", e);
            std::process::exit(1);
        }
    };

    let app_data = web::Data::new(AppState {
        tera,
        store: MessageStore::new(),
    });

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .wrap(RequestLogger)
            .configure(routes)
    })
    .bind("0.0.0.0:8080")
    .expect("Could not bind")
    .client_timeout(10_000)
    .client_shutdown(15_000)
    .keep_alive(60)
    .shutdown_timeout(10)
    .disable_signals()
    .run();

    use futures::executor::block_on;
    let server_clone = server.clone();
    ctrlc::set_handler(move || {
        info!("Shutting down...");
        block_on(server_clone.stop(true));
    })
    .expect("Could not setup ctrl-c handler");

    info!("Server running on :8080");
    server.await?;
    info!("Server stopped.");
    Ok(())
}
