// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 统计网页服务器
//!
//! 基于 Tokio 运行时的多线程服务器，把每个连接交给 [`Dispatcher`] 处理。
//! 核心功能包括：
//! - 以逻辑资源为键、同一键只生成一次的响应缓存
//! - 按处理器划分的 HTTP Basic 认证与权限等级授权
//! - 静态资源（JS/CSS/图片/字体）服务
//! - 后台管理控制台（CLI 指令交互）

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Instant,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    sync::Notify,
};

use statsweb::{
    auth::BasicAuthenticator,
    config::Config,
    render::HtmlPageRenderer,
    resources::FileResourceLoader,
    store::{Database, MemoryDatabase, StoreState},
    Dispatcher, HttpRequestMethod, Request, ResponseCache, ResponseFactory, TimeToLive,
};

const CONFIG_FILE: &str = "config/development.toml";
const LOG_CONFIG_FILE: &str = "config/log4rs.yaml";
const REQUEST_BUFFER_SIZE: usize = 8192;

/// 进程内共享的服务对象。
struct Services {
    db: Arc<MemoryDatabase>,
    cache: Arc<ResponseCache>,
    factory: Arc<ResponseFactory>,
    dispatcher: Arc<Dispatcher>,
}

fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file(LOG_CONFIG_FILE, Default::default()) {
        eprintln!("无法初始化日志系统（{}）：{}", LOG_CONFIG_FILE, e);
        return;
    }

    // 2. 环境配置加载
    let config = match Config::from_toml(CONFIG_FILE) {
        Ok(config) => {
            info!("配置文件已载入");
            config
        }
        Err(e) => {
            error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
            Config::new()
        }
    };
    info!("www root: {}", config.www_root());

    // 3. 异步运行时定制：根据配置文件分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            return;
        }
    };

    let services = build_services(&config);
    runtime.block_on(serve(config, services));
    info!("服务器已停止");
}

/// 组装存储、缓存、响应工厂与分发器。
fn build_services(config: &Config) -> Services {
    let db = match MemoryDatabase::from_file(config.dataset()) {
        Ok(db) => db,
        Err(e) => {
            warn!("无法载入数据集，使用空数据库启动：{}", e);
            MemoryDatabase::new()
        }
    };
    for user in config.auth().users() {
        db.add_user(user.clone());
    }
    let db = Arc::new(db);

    let cache = ResponseCache::from_capacity(config.cache_size());
    let cache = Arc::new(match config.cache_ttl() {
        Some(ttl) => {
            info!("缓存条目将在{}秒后过期", ttl.as_secs());
            cache.with_expiry(TimeToLive(ttl))
        }
        None => cache,
    });

    let factory = Arc::new(ResponseFactory::new(
        db.clone(),
        Arc::new(HtmlPageRenderer),
        Arc::new(FileResourceLoader::new(config.www_root())),
    ));
    let mut dispatcher =
        Dispatcher::new(factory.clone()).with_standard_routes(db.clone(), db.clone(), cache.clone());
    if config.auth().enabled() {
        info!("已启用HTTP Basic认证，共{}名网页用户", config.auth().users().len());
        dispatcher = dispatcher.with_authenticator(Arc::new(BasicAuthenticator::new(db.clone())));
    } else {
        warn!("认证已关闭，所有页面均可直接访问");
    }

    Services {
        db,
        cache,
        factory,
        dispatcher: Arc::new(dispatcher),
    }
}

async fn serve(config: Config, services: Services) {
    // 支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
    let port: u16 = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}:{}上监听Socket连接", address, port);
    let socket = SocketAddrV4::new(address, port);

    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("端口{}绑定完成", port);

    let shutdown = Arc::new(Notify::new());
    let active_connection = Arc::new(AtomicU32::new(0));

    // 启动交互式管理控制台任务，不阻塞监听循环
    tokio::spawn(console(
        Arc::clone(&shutdown),
        Arc::clone(&active_connection),
        Arc::clone(&services.db),
        Arc::clone(&services.cache),
    ));

    let mut id: u128 = 0;

    // 主事件循环：持续接收新连接并将其分发至线程池
    loop {
        let (mut stream, addr) = tokio::select! {
            _ = shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("接受连接失败：{}", e);
                    continue;
                }
            },
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let active_connection = Arc::clone(&active_connection);
        let dispatcher = Arc::clone(&services.dispatcher);
        let factory = Arc::clone(&services.factory);

        tokio::spawn(async move {
            active_connection.fetch_add(1, Ordering::SeqCst);
            handle_connection(&mut stream, id, dispatcher, factory).await;
            active_connection.fetch_sub(1, Ordering::SeqCst);
        });
        id += 1;
    }
}

/// 后台管理控制台，读取标准输入中的指令。
async fn console(
    shutdown: Arc<Notify>,
    active_connection: Arc<AtomicU32>,
    db: Arc<MemoryDatabase>,
    cache: Arc<ResponseCache>,
) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                shutdown.notify_one();
                println!("停机指令已激活，服务器将停止接受新连接...");
                break;
            }
            "status" => {
                println!("== Statsweb 状态 ===");
                println!("当前活跃连接数: {}", active_connection.load(Ordering::SeqCst));
                println!("缓存条目: {}/{}", cache.len(), cache.capacity());
                println!("数据库状态: {}", db.state());
                println!("====================");
            }
            "reload" => {
                cache.invalidate_all();
                println!("响应缓存已清空");
            }
            "close" => {
                db.set_state(StoreState::Closed);
                println!("数据库已关闭，页面请求将返回503");
            }
            "open" => {
                db.set_state(StoreState::Open);
                cache.invalidate_all();
                println!("数据库已开启，响应缓存已清空");
            }
            "help" => {
                println!("== Statsweb Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("reload - 清空响应缓存");
                println!("close  - 将数据库置为CLOSED状态");
                println!("open   - 将数据库置为OPEN状态并清空缓存");
                println!("help   - 显示此帮助信息");
                println!("====================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期：读取解析请求、交给分发器、发送响应。
async fn handle_connection(
    stream: &mut TcpStream,
    id: u128,
    dispatcher: Arc<Dispatcher>,
    factory: Arc<ResponseFactory>,
) {
    let mut buffer = vec![0; REQUEST_BUFFER_SIZE];

    if let Err(e) = stream.readable().await {
        error!("[ID{}]等待TCPStream可读时遇到错误: {}", id, e);
        return;
    }
    match stream.try_read(&mut buffer) {
        Ok(0) => return, // 客户端主动关闭连接
        Ok(n) => buffer.truncate(n),
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
    }
    debug!("[ID{}]HTTP请求接收完毕", id);

    let start_time = Instant::now();

    let request = match Request::try_from(&buffer, id) {
        Ok(request) => request,
        Err(e) => {
            let response = factory.bad_request_400(&e.to_string());
            let _ = stream.write_all(&response.to_wire(&[], false)).await;
            return;
        }
    };

    // 页面生成是同步的，放到阻塞线程池中执行，避免占住异步工作线程
    let outcome = tokio::task::spawn_blocking(move || {
        let response = dispatcher.dispatch(&request, id);
        (request, response)
    })
    .await;
    let (request, response) = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("[ID{}]分发任务异常结束: {}", id, e);
            return;
        }
    };

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );

    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, ",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    let headonly = request.method() == HttpRequestMethod::Head;
    let response_bytes = response.to_wire(request.accept_encoding(), headonly);
    if let Err(e) = stream.write_all(&response_bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
    debug!("[ID{}]RESPONDED {} bytes", id, response_bytes.len());
}
