use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use serde_json::json;
use std::io::Write; // for env_logger custom formatter

use tutorly_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::StatusNotifier,
    handlers,
    middlewares::{create_cors, AuthMiddleware},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // 创建JWT服务
    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.expires_in);

    // 状态变更广播与每 tutor 的排课互斥锁
    let notifier = StatusNotifier::new(256);
    let tutor_locks = TutorLocks::new();

    // 创建服务
    let auth_service = AuthService::new(pool.clone(), jwt_service.clone());
    let student_service = StudentService::new(pool.clone());
    let lesson_service = LessonService::new(pool.clone(), notifier.clone(), tutor_locks.clone());
    let statistics_service = StatisticsService::new(pool.clone());
    let status_service = StatusService::new(pool.clone(), notifier.clone());
    let recurring_service =
        RecurringService::new(pool.clone(), lesson_service.clone(), tutor_locks.clone());

    // 启动后台任务：状态扫描 + 周期课程延长
    tasks::spawn_all(
        status_service.clone(),
        recurring_service.clone(),
        config.scheduler.clone(),
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(student_service.clone()))
            .app_data(web::Data::new(lesson_service.clone()))
            .app_data(web::Data::new(statistics_service.clone()))
            .app_data(web::Data::new(status_service.clone()))
            .app_data(web::Data::new(notifier.clone()))
            .configure(swagger_config)
            .route("/health", web::get().to(health))
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::student_config)
                    .configure(handlers::lesson_config)
                    .configure(handlers::statistics_config)
                    .configure(handlers::events_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
