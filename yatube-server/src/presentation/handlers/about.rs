use actix_web::{HttpResponse, Scope, get, web};
use tera::Tera;

use crate::domain::error::AppError;
use crate::presentation::extractors::MaybeUser;
use crate::presentation::render::{base_context, html, render};

pub fn scope() -> Scope {
    web::scope("/about").service(author).service(tech)
}

#[get("/author/")]
async fn author(tera: web::Data<Tera>, user: MaybeUser) -> Result<HttpResponse, AppError> {
    let ctx = base_context(&user);
    Ok(html(render(&tera, "about/author.html.tera", &ctx)?))
}

#[get("/tech/")]
async fn tech(tera: web::Data<Tera>, user: MaybeUser) -> Result<HttpResponse, AppError> {
    let ctx = base_context(&user);
    Ok(html(render(&tera, "about/tech.html.tera", &ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};

    #[actix_web::test]
    async fn static_pages_render() {
        let tera =
            Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*")).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(tera))
                .service(scope()),
        )
        .await;

        for uri in ["/about/author/", "/about/tech/"] {
            let resp =
                test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK, "GET {uri}");
        }
    }
}
