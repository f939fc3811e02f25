use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};

pub async fn index_page() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html")],
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Invisibility Cloak</title>
    <link href="https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600&display=swap" rel="stylesheet">
    <style>
        :root {
            --primary: #7c3aed;
            --primary-hover: #6d28d9;
            --bg: #0f172a;
            --panel: #1e293b;
            --border: #334155;
            --text-primary: #f1f5f9;
            --text-secondary: #94a3b8;
            --ok: #10b981;
            --err: #ef4444;
        }

        * { margin: 0; padding: 0; box-sizing: border-box; }

        body {
            background: var(--bg);
            color: var(--text-primary);
            font-family: 'Inter', sans-serif;
            min-height: 100vh;
            display: flex;
            flex-direction: column;
            align-items: center;
            padding: 24px;
            gap: 20px;
        }

        .brand { font-weight: 600; font-size: 1.4rem; }

        .banner {
            background: var(--panel);
            border: 1px solid var(--border);
            border-radius: 6px;
            padding: 12px 20px;
            color: var(--text-secondary);
            font-size: 0.9rem;
            max-width: 720px;
            width: 100%;
            text-align: center;
        }

        .stage {
            background: #000;
            border: 1px solid var(--border);
            border-radius: 6px;
            overflow: hidden;
            max-width: 720px;
            width: 100%;
            aspect-ratio: 4 / 3;
            display: flex;
            align-items: center;
            justify-content: center;
        }

        .stage img { width: 100%; height: 100%; object-fit: contain; }

        .controls {
            display: flex;
            flex-wrap: wrap;
            gap: 12px;
            justify-content: center;
        }

        .btn {
            background: var(--primary);
            color: white;
            border: none;
            padding: 10px 18px;
            border-radius: 4px;
            font-weight: 600;
            cursor: pointer;
            font-size: 0.9rem;
        }

        .btn:hover { background: var(--primary-hover); }
        .btn:disabled { opacity: 0.6; cursor: not-allowed; }
        .btn.secondary { background: var(--panel); border: 1px solid var(--border); }

        .picker {
            display: flex;
            align-items: center;
            gap: 8px;
            background: var(--panel);
            border: 1px solid var(--border);
            border-radius: 4px;
            padding: 4px 10px;
            font-size: 0.85rem;
            color: var(--text-secondary);
        }

        .picker input { width: 36px; height: 28px; border: none; background: none; cursor: pointer; }

        .stats { font-size: 0.8rem; color: var(--text-secondary); }

        .toast {
            position: fixed;
            bottom: 24px;
            right: 24px;
            padding: 10px 16px;
            border-radius: 4px;
            font-size: 0.85rem;
            font-weight: 500;
            opacity: 0;
            transition: opacity 0.3s;
        }

        .toast.visible { opacity: 1; }
        .toast.ok { background: var(--ok); }
        .toast.err { background: var(--err); }
    </style>
</head>
<body>
    <div class="brand">Invisibility Cloak</div>
    <div class="banner" id="banner">Step out of view and click "Capture Background" to start.</div>

    <div class="stage"><img id="feed" src="/video_feed" alt="Live feed"></div>

    <div class="controls">
        <button class="btn" id="capture_btn">Capture Background</button>
        <label class="picker">Cloak color <input type="color" id="color_input" value="#ff0000"></label>
        <button class="btn" id="color_btn">Set Color</button>
        <button class="btn secondary" id="reset_btn">Reset</button>
    </div>

    <div class="stats" id="stats"></div>
    <div class="toast" id="toast"></div>

    <script>
        const banner = document.getElementById('banner');
        const stats = document.getElementById('stats');
        const toast = document.getElementById('toast');

        function notify(message, ok) {
            toast.textContent = message;
            toast.className = 'toast visible ' + (ok ? 'ok' : 'err');
            setTimeout(() => toast.classList.remove('visible'), 2500);
        }

        function hexToRgb(hex) {
            const v = parseInt(hex.slice(1), 16);
            return [(v >> 16) & 255, (v >> 8) & 255, v & 255];
        }

        async function post(path, body) {
            const res = await fetch(path, {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: body ? JSON.stringify(body) : '{}'
            });
            return res.json();
        }

        async function withButton(btn, label, action) {
            const original = btn.textContent;
            btn.textContent = label;
            btn.disabled = true;
            try { await action(); }
            catch (e) { notify('Request failed', false); }
            finally { btn.textContent = original; btn.disabled = false; }
        }

        document.getElementById('capture_btn').addEventListener('click', (e) =>
            withButton(e.target, 'Capturing in 3s...', async () => {
                banner.textContent = 'Move out of the frame, capturing background...';
                const data = await post('/capture_background');
                notify(data.success ? 'Background captured' : 'Background capture failed', data.success);
            }));

        document.getElementById('color_btn').addEventListener('click', (e) =>
            withButton(e.target, 'Setting...', async () => {
                const color = hexToRgb(document.getElementById('color_input').value);
                const data = await post('/set_color', { color });
                if (data.success) {
                    notify('Color set (HSV ' + data.color.join(', ') + ')', true);
                } else {
                    notify(data.error || 'Failed to set color', false);
                }
            }));

        document.getElementById('reset_btn').addEventListener('click', (e) =>
            withButton(e.target, 'Resetting...', async () => {
                await post('/reset');
                notify('Reset', true);
            }));

        async function refreshStatus() {
            try {
                const s = await (await fetch('/status')).json();
                if (!s.camera_available) {
                    banner.textContent = 'Camera not available. Check the connection and refresh.';
                } else if (s.capturing) {
                    banner.textContent = 'Capturing background...';
                } else if (s.ready) {
                    banner.textContent = 'Cloak active. Hold up something in your chosen color.';
                } else if (s.target) {
                    banner.textContent = 'Color chosen. Now capture the background.';
                } else {
                    banner.textContent = 'Capture the background, then pick your cloak color.';
                }
                stats.textContent = s.fps + ' fps' + (s.target ? ' | target HSV ' + s.target.join(', ') : '');
            } catch (e) { console.error('Status error', e); }
        }

        setInterval(refreshStatus, 1000);
        refreshStatus();
    </script>
</body>
</html>
"##,
    )
}
