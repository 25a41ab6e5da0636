use actix_web::web;

use crate::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(handlers::index)))
        .service(web::resource("/api/health").route(web::get().to(handlers::health_check)))
        .service(web::resource("/api/whats-next").route(web::get().to(handlers::whats_next)))
        .service(
            web::resource("/api/skip")
                .route(web::post().to(handlers::skip_meeting))
                .route(web::delete().to(handlers::clear_skips)),
        )
        .service(web::resource("/api/clear_skips").route(web::get().to(handlers::clear_skips_and_refresh)))
        .service(web::resource("/api/alexa/next-meeting").route(web::get().to(handlers::alexa_next_meeting)))
        .service(
            web::resource("/api/alexa/time-until-next")
                .route(web::get().to(handlers::alexa_time_until_next)),
        )
        .service(web::resource("/api/alexa/done-for-day").route(web::get().to(handlers::alexa_done_for_day)))
        .service(
            web::resource("/api/alexa/launch-summary").route(web::get().to(handlers::alexa_launch_summary)),
        )
        .service(
            web::resource("/api/alexa/morning-summary")
                .route(web::get().to(handlers::alexa_morning_summary)),
        );
}
